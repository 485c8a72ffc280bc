// ==========================================
// CSV 导出（csv crate Writer）
// ==========================================

use super::{ExportError, COLUMN_KEYS};
use crate::api::roster_api::RosterEntry;
use crate::i18n::t_in;

/// 渲染花名册 CSV（UTF-8，带表头）
pub fn render_roster_csv(entries: &[RosterEntry], locale: &str) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    let header: Vec<String> = COLUMN_KEYS.iter().map(|key| t_in(key, locale)).collect();
    writer.write_record(&header)?;

    for entry in entries {
        writer.write_record([
            entry.pool_name.clone(),
            entry.participant_id.clone(),
            entry.display_name.clone().unwrap_or_default(),
            entry.region.clone().unwrap_or_default(),
            status_label(entry, locale),
            entry.enrolled_at.format("%Y-%m-%d %H:%M").to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))
}

/// 报名状态的本地化标签（项目池成员显示 "-"）
pub(crate) fn status_label(entry: &RosterEntry, locale: &str) -> String {
    match entry.status {
        Some(status) => t_in(status.label_key(), locale),
        None => "-".to_string(),
    }
}
