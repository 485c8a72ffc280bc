use super::children::load_children;
use super::records::{map_procedure_row, ProcedureRepository, PROCEDURE_COLUMNS};
use crate::db::format_ts;
use crate::domain::procedure::{Procedure, ProcedureFilter};
use crate::repository::error::RepositoryResult;
use crate::repository::sql_builder::SqlQueryBuilder;
use rusqlite::{params_from_iter, Result as SqliteResult};

impl ProcedureRepository {
    /// 条件分页查询
    ///
    /// # 参数
    /// - filter: 过滤条件（None 字段忽略）
    /// - page: 页码（从 1 开始）
    /// - page_size: 每页条数
    ///
    /// # 返回
    /// - Ok((当前页事项, 满足条件的总数))
    pub fn query(
        &self,
        filter: &ProcedureFilter,
        page: usize,
        page_size: usize,
    ) -> RepositoryResult<(Vec<Procedure>, u64)> {
        let conn = self.get_conn()?;

        let select = format!("SELECT {} FROM admin_procedure", PROCEDURE_COLUMNS);
        let mut builder = SqlQueryBuilder::new(&select);
        builder
            .filter("requester_id = ?", filter.requester_id.clone())
            .filter("state = ?", filter.state.map(|s| s.to_db_str().to_string()))
            .filter("kind = ?", filter.kind.map(|k| k.to_db_str().to_string()))
            .filter("origin_region = ?", filter.origin_region.clone())
            .filter("submitted_at >= ?", filter.submitted_from.as_ref().map(format_ts))
            .filter("submitted_at < ?", filter.submitted_to.as_ref().map(format_ts));

        let count_sql = builder.build_count("SELECT COUNT(*) FROM admin_procedure");
        let total: i64 = conn.query_row(&count_sql, params_from_iter(builder.params().iter()), |row| {
            row.get(0)
        })?;

        builder
            .order_by("submitted_at DESC, procedure_id")
            .limit(page_size)
            .offset(page.saturating_sub(1).saturating_mul(page_size));

        let sql = builder.build();
        let mut stmt = conn.prepare(&sql)?;
        let mut items = stmt
            .query_map(params_from_iter(builder.params().iter()), |row| map_procedure_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        for item in items.iter_mut() {
            load_children(&conn, item)?;
        }

        Ok((items, total.max(0) as u64))
    }
}
