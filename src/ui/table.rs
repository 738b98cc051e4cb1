use tabled::builder::Builder;
use tabled::settings::{Padding, Style};

use crate::ui::widgets::TableSpec;

pub fn render_table(spec: &TableSpec) -> String {
    let mut builder = Builder::default();
    if !spec.headers.is_empty() {
        builder.push_record(spec.headers.iter().map(String::as_str));
    }
    for row in &spec.rows {
        builder.push_record(row.iter().map(String::as_str));
    }
    let mut table = builder.build();
    // The results table reads best without grid chrome.
    table.with(Style::blank());
    table.with(Padding::new(0, 2, 0, 0));
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_renders_headers_and_rows() {
        let rendered = render_table(&TableSpec::new(
            vec!["test".to_owned(), "status".to_owned(), "time".to_owned()],
            vec![
                vec!["./ram.sh".to_owned(), "[PASSED]".to_owned(), "3.1s".to_owned()],
                vec![
                    "./usb_test".to_owned(),
                    "[FAILED=2]".to_owned(),
                    "9.8s".to_owned(),
                ],
            ],
        ));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("status"));
        assert!(lines[1].contains("./ram.sh"));
        assert!(lines[2].contains("[FAILED=2]"));
    }
}
