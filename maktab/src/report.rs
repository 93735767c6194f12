use anyhow::Result;
use colored::{Color, Colorize};
use profimaktab::types::{format_date, StudentSummary};
use std::io::Write;

/// Color for a daily average on the usual 2..5 scale.
pub fn average_color(average: f64) -> Color {
    match average {
        a if a >= 4.5 => Color::Green,
        a if a >= 3.5 => Color::Blue,
        a if a >= 2.5 => Color::Yellow,
        a if a > 0.0 => Color::Red,
        _ => Color::White,
    }
}

pub fn format_status(summary: &StudentSummary) -> String {
    let id_padded = format!("{:12}", summary.student_id.as_str());
    format!(
        "{} {:>4.1} [{} lessons, {}]",
        id_padded,
        summary.daily_average,
        summary.populated(),
        format_date(summary.date)
    )
    .color(average_color(summary.daily_average))
    .to_string()
}

/// Writes the populated slots of a summary as tab separated rows.
pub fn write_summary_tsv(writer: &mut impl Write, summary: &StudentSummary) -> Result<()> {
    writeln!(writer, "SLOT\tLESSON\tGRADE\tTOPIC\tHOMEWORK")?;
    for (index, slot) in summary.slots().filter(|(_, slot)| !slot.is_blank()) {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            index,
            one_line(&slot.name),
            slot.grade,
            one_line(&slot.topic),
            one_line(&slot.homework)
        )?;
    }
    writeln!(writer, "AVERAGE\t{:.1}", summary.daily_average)?;
    Ok(())
}

fn one_line(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}
