use crate::analyzer::Measurement;
use std::borrow::Cow;
use std::io::Write;

pub const HEADER: [&str; 5] = [
    "filename",
    "compression",
    "plain (byte)",
    "label (byte)",
    "breakdown (byte)",
];

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_row<W: Write>(w: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let row: Vec<Cow<'_, str>> = fields.iter().map(|f| escape(f)).collect();
    writeln!(w, "{}", row.join(","))
}

/// Writes one CSV row per measurement, in order, after a fixed header.
pub fn write_csv<W: Write>(mut w: W, results: &[Measurement]) -> anyhow::Result<()> {
    write_row(&mut w, &HEADER)?;
    for m in results {
        write_row(
            &mut w,
            &[
                m.filename.as_str(),
                m.compression.name(),
                m.sizes.plain.to_string().as_str(),
                m.sizes.label.to_string().as_str(),
                m.sizes.breakdown.to_string().as_str(),
            ],
        )?;
    }
    w.flush()?;
    Ok(())
}
