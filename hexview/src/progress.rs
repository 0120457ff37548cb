use crate::operation::OperationKind;
use hexviewlib::Progress;

const BAR_WIDTH: usize = 10;

/// Status line such as `[---->------]  40% converted to hex`.
#[must_use]
pub fn progress_text(kind: OperationKind, progress: Progress) -> String {
    let percent = progress.percent();
    let filled = percent * BAR_WIDTH / 100;
    format!(
        "[{}>{}] {percent:>3}% {}",
        "-".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        kind.progress_suffix()
    )
}
