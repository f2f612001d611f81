//! Single-page PDF layout of a sheet grid, used by the local file store's
//! conversion. Cells are placed on a fixed grid of A4 points.
//!
//! Latin-1 text is set in Helvetica (`/F1`). Anything wider goes through a
//! CID-keyed Korean font (`/F2`) with the predefined `UniKS-UCS2-H` CMap, so
//! the content stream carries the UTF-16 code units as a hex string.

use crate::sheet::Grid;

const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN_X: f64 = 50.4; // 0.7in
const MARGIN_Y: f64 = 54.0; // 0.75in
const ROW_HEIGHT: f64 = 20.0;
const FONT_SIZE: f64 = 10.0;
const CJK_FONT: &str = "HYSMyeongJo-Medium";

pub fn render_grid(grid: &Grid) -> Vec<u8> {
    let cols = grid.rows.iter().map(|r| r.len()).max().unwrap_or(1).max(1);
    let col_width = (PAGE_WIDTH - 2.0 * MARGIN_X) / cols as f64;

    let mut content = String::new();
    for (r, cells) in grid.rows.iter().enumerate() {
        let y = PAGE_HEIGHT - MARGIN_Y - FONT_SIZE - r as f64 * ROW_HEIGHT;
        if y < MARGIN_Y {
            break;
        }
        for (c, cell) in cells.iter().enumerate() {
            let text = cell.value.to_string();
            if text.trim().is_empty() {
                continue;
            }
            let x = MARGIN_X + c as f64 * col_width;
            let (font, shown) = if is_latin1(&text) {
                ("F1", format!("({})", escape(&text)))
            } else {
                ("F2", format!("<{}>", ucs2_hex(&text)))
            };
            content.push_str(&format!(
                "BT /{font} {FONT_SIZE} Tf {x:.2} {y:.2} Td {shown} Tj ET\n"
            ));
        }
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R /F2 6 0 R >> >> /Contents 5 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ),
        format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{CJK_FONT} /Encoding /UniKS-UCS2-H \
             /DescendantFonts [7 0 R] >>"
        ),
        format!(
            "<< /Type /Font /Subtype /CIDFontType0 /BaseFont /{CJK_FONT} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Korea1) /Supplement 1 >> \
             /FontDescriptor 8 0 R /DW 1000 >>"
        ),
        format!(
            "<< /Type /FontDescriptor /FontName /{CJK_FONT} /Flags 6 \
             /FontBBox [0 -148 1001 880] /ItalicAngle 0 /Ascent 880 /Descent -148 \
             /CapHeight 880 /StemV 91 >>"
        ),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| (c as u32) <= 0xFF)
}

/// Big-endian UCS-2 hex for a `/F2` string. Characters outside the BMP become
/// `?`; control characters become spaces.
fn ucs2_hex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 4);
    for ch in text.chars() {
        let unit = match ch as u32 {
            n if n < 0x20 => 0x20,
            n if n > 0xFFFF => u32::from(b'?'),
            n => n,
        };
        out.push_str(&format!("{unit:04X}"));
    }
    out
}

/// Escape a Latin-1 string for a PDF literal.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' | '\r' | '\t' => out.push(' '),
            c if (c as u32) < 0x20 || (c as u32) > 0xFF => out.push('?'),
            c if (c as u32) < 0x80 => out.push(c),
            c => out.push_str(&format!("\\{:03o}", c as u32)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    #[test]
    fn renders_cell_text() {
        let mut grid = Grid::new("Document");
        grid.set_value(8, 3, CellValue::text("Kim (Acme)")).unwrap();
        grid.set_value(24, 10, CellValue::Number(50000.0)).unwrap();
        let pdf = String::from_utf8(render_grid(&grid)).unwrap();
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.contains("(Kim \\(Acme\\)) Tj"));
        assert!(pdf.contains("(50000) Tj"));
        assert!(pdf.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn empty_grid_is_still_a_document() {
        let pdf = render_grid(&Grid::new("Document"));
        assert!(pdf.starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn escape_handles_non_ascii() {
        assert_eq!(escape("é"), "\\351");
        assert_eq!(escape("a\tb"), "a b");
    }

    #[test]
    fn hangul_name_is_kept_as_ucs2() {
        let mut grid = Grid::new("Document");
        grid.set_value(8, 3, CellValue::text("김철수")).unwrap();
        grid.set_value(8, 8, CellValue::text("Café")).unwrap();
        let pdf = String::from_utf8(render_grid(&grid)).unwrap();

        assert!(pdf.contains("/F2 10 Tf"));
        assert!(pdf.contains("<AE40CCA0C218> Tj"));
        assert!(pdf.contains("/Encoding /UniKS-UCS2-H"));
        assert!(pdf.contains("(Caf\\351) Tj"));
        assert!(!pdf.contains("(???)"));
    }

    #[test]
    fn mixed_text_uses_the_wide_font() {
        assert_eq!(ucs2_hex("Kim 김"), "004B0069006D0020AE40");
        assert_eq!(ucs2_hex("😀"), "003F");
    }
}
