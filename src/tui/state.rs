use crate::console::ConsoleState;

/// UI-local view state. The console snapshot arrives from the controller
/// task; everything else here is chrome owned by the UI thread.
#[derive(Default)]
pub struct UiState {
    /// 0 = dashboard, 1 = help.
    pub tab: usize,
    pub console: ConsoleState,
    pub selected: usize,
    pub info: String,
    /// Admin key entry buffer; committed to the controller on Enter.
    pub key_editing: bool,
    pub key_input: String,
    /// Wall-clock stamp of the last fetch that completed cleanly.
    pub fetched_at: Option<String>,
    pub base_url: String,
    pub limit: u32,
}

impl UiState {
    /// Keep the selection inside the table after rows are replaced.
    pub fn clamp_selection(&mut self) {
        if self.console.items.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.console.items.len() {
            self.selected = self.console.items.len() - 1;
        }
    }
}
