// ==========================================
// 报名与事项审批核心 - 花名册导出
// ==========================================
// 职责: 把已解析好的花名册行渲染为 CSV / PDF 字节
// 说明: 渲染只依赖传入的行与语言，不访问数据库
// ==========================================

pub mod csv_export;
pub mod pdf;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use csv_export::render_roster_csv;
pub use pdf::{render_roster_pdf, SimplePdfWriter};

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Pdf => write!(f, "pdf"),
        }
    }
}

/// 导出错误
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("导出缓冲区错误: {0}")]
    Buffer(String),
}

/// 表头 i18n 键（列顺序固定）
pub(crate) const COLUMN_KEYS: [&str; 6] = [
    "roster.column.pool",
    "roster.column.participant_id",
    "roster.column.display_name",
    "roster.column.region",
    "roster.column.status",
    "roster.column.enrolled_at",
];
