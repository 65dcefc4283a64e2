//! `feather tables` command: list every selector and what it stands for.

use feather_core::resolver::{Category, MaterialFamily, PrecisionScale};

const TABLES: [(Category, &str); 5] = [
    (Category::Material(MaterialFamily::Metal), "lighten --material"),
    (Category::UseCase, "lighten --use-case"),
    (Category::Material(MaterialFamily::Resin), "printable --material"),
    (Category::Precision(PrecisionScale::FiveLevel), "lighten/printable --precision"),
    (Category::Precision(PrecisionScale::ThreeLevel), "hollow --precision"),
];

/// Render the selector tables as plain text.
pub fn render_tables() -> String {
    let mut out = String::new();
    for (category, flag) in TABLES {
        out.push_str(&format!("{category} ({flag})\n"));
        for (selector, label) in category.entries() {
            out.push_str(&format!("  {selector:>2}  {label}\n"));
        }
        out.push('\n');
    }
    out
}

pub fn run_tables() {
    print!("{}", render_tables());
}
