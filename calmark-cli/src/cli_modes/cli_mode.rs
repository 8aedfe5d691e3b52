#[derive(Debug, PartialEq, Eq)]
pub enum CliModeResult {
    Finish,
    NothingToDo,
}
