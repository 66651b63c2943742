//! Render a [`Scheme`] back to `primer.bed` text.
use crate::scheme::Scheme;

/// Headers first (each guaranteed to start with `#`), then every record in
/// canonical order. Unparseable input lines are not written back.
pub fn serialize(scheme: &Scheme) -> String {
    let mut out = String::new();
    for h in scheme.headers() {
        if !h.starts_with('#') {
            out.push('#');
        }
        out.push_str(h);
        out.push('\n');
    }
    for b in scheme.bedlines() {
        out.push_str(&b.to_bed());
        out.push('\n');
    }
    out
}
