/// Trimmed character count below which a page is never considered complete.
pub const MIN_CHARS: usize = 500;
const MIN_PARAGRAPH_BREAKS: usize = 2;

/// Length-plus-structure proxy for "the page finished rendering".
///
/// Long prose-only pages with fewer than two paragraph breaks are judged
/// incomplete and will be retried once.
pub fn is_complete(markdown: Option<&str>) -> bool {
    let Some(text) = markdown else {
        return false;
    };
    if text.trim().chars().count() < MIN_CHARS {
        return false;
    }
    indicator_count(text) > 0
}

fn indicator_count(text: &str) -> usize {
    let has_heading = text.contains("##");
    let has_table = text.contains('|');
    let has_list = text.lines().any(|l| l.starts_with('-'));
    let has_paragraphs = paragraph_breaks(text) >= MIN_PARAGRAPH_BREAKS;

    [has_heading, has_table, has_list, has_paragraphs]
        .into_iter()
        .filter(|&present| present)
        .count()
}

/// Blank-line gaps between non-blank blocks. Runs of blank lines count once.
fn paragraph_breaks(text: &str) -> usize {
    let mut blocks: usize = 0;
    let mut in_block = false;
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if !blank && !in_block {
            blocks += 1;
        }
        in_block = !blank;
    }
    blocks.saturating_sub(1)
}
