// ==========================================
// 极简 PDF 写入器
// ==========================================
// 单字体 (Helvetica, WinAnsi) 纯文本分页输出
// 限制: 标准字体无法显示中文，非 Latin-1 字符替换为 '?'
// ==========================================

use super::COLUMN_KEYS;
use crate::api::roster_api::RosterEntry;
use crate::export::csv_export::status_label;
use crate::i18n::t_in;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 40;
const FONT_SIZE: u32 = 9;
const LINE_HEIGHT: u32 = 13;

/// 纯文本 PDF 写入器
#[derive(Debug, Default)]
pub struct SimplePdfWriter {
    lines: Vec<String>,
}

impl SimplePdfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一行文本
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    /// 每页可容纳的行数
    pub fn lines_per_page() -> usize {
        ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize
    }

    /// 输出 PDF 字节
    pub fn finish(&self) -> Vec<u8> {
        let per_page = Self::lines_per_page();
        let pages: Vec<&[String]> = if self.lines.is_empty() {
            vec![&self.lines[..]]
        } else {
            self.lines.chunks(per_page).collect()
        };

        // 对象编号: 1 Catalog, 2 Pages, 3 Font, 之后每页 (Page, Contents) 两个对象
        let page_obj = |i: usize| 4 + i * 2;
        let mut objects: Vec<String> = Vec::with_capacity(3 + pages.len() * 2);

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids = (0..pages.len())
            .map(|i| format!("{} 0 R", page_obj(i)))
            .collect::<Vec<_>>()
            .join(" ");
        objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );

        for (i, page_lines) in pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                page_obj(i) + 1
            ));

            let mut content = format!(
                "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
                FONT_SIZE,
                LINE_HEIGHT,
                MARGIN,
                PAGE_HEIGHT - MARGIN
            );
            for line in page_lines.iter() {
                content.push('(');
                content.push_str(&escape_text(line));
                content.push_str(") Tj T*\n");
            }
            content.push_str("ET");

            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }

        let xref_offset = out.len();
        out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            out.push_str(&format!("{:010} 00000 n \n", offset));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        ));

        out.into_bytes()
    }
}

/// 转义 PDF 字符串，并把无法用标准字体显示的字符替换为 '?'
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// 渲染花名册 PDF
///
/// 标签固定使用英文（标准字体限制）
pub fn render_roster_pdf(title: &str, entries: &[RosterEntry]) -> Vec<u8> {
    const LOCALE: &str = "en";
    let mut writer = SimplePdfWriter::new();

    writer.line(title).line(format!("{}: {}", t_in("roster.total", LOCALE), entries.len()));
    writer.line("");

    let header: Vec<String> = COLUMN_KEYS.iter().map(|key| t_in(key, LOCALE)).collect();
    writer.line(header.join(" | "));

    for entry in entries {
        writer.line(
            [
                entry.pool_name.clone(),
                entry.participant_id.clone(),
                entry.display_name.clone().unwrap_or_default(),
                entry.region.clone().unwrap_or_default(),
                status_label(entry, LOCALE),
                entry.enrolled_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
            .join(" | "),
        );
    }

    writer.finish()
}
