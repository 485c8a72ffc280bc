// ==========================================
// 报名与事项审批核心 - SQL 构建工具
// ==========================================
// 职责: 动态过滤条件 + 分页的查询构建
// 约束: 过滤值一律走参数绑定（?N），只有 LIMIT/OFFSET 以整数内联
// ==========================================

/// SQL 查询构建器（流式 API）
///
/// # 示例
/// ```
/// use enrollment_core::repository::sql_builder::SqlQueryBuilder;
///
/// let mut builder = SqlQueryBuilder::new("SELECT * FROM admin_procedure");
/// builder.filter("state = ?", Some("IN_REVIEW".to_string()));
/// builder.filter("kind = ?", None);
/// let sql = builder.order_by("submitted_at DESC").limit(20).offset(40).build();
///
/// assert_eq!(
///     sql,
///     "SELECT * FROM admin_procedure WHERE state = ?1 ORDER BY submitted_at DESC LIMIT 20 OFFSET 40"
/// );
/// assert_eq!(builder.params(), &["IN_REVIEW".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct SqlQueryBuilder {
    select_clause: String,
    where_clauses: Vec<String>,
    params: Vec<String>,
    order_by_clause: Option<String>,
    limit_clause: Option<usize>,
    offset_clause: Option<usize>,
}

impl SqlQueryBuilder {
    /// 创建新的 SQL 查询构建器
    pub fn new(select: &str) -> Self {
        Self {
            select_clause: select.to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_by_clause: None,
            limit_clause: None,
            offset_clause: None,
        }
    }

    /// 添加固定条件（无参数）
    pub fn where_clause(&mut self, condition: &str) -> &mut Self {
        self.where_clauses.push(condition.to_string());
        self
    }

    /// 条件添加过滤：value 为 None 时忽略
    ///
    /// condition 中的每个 `?` 都绑定同一个 value（按出现顺序编号）
    pub fn filter(&mut self, condition: &str, value: Option<String>) -> &mut Self {
        if let Some(v) = value {
            let mut numbered = String::with_capacity(condition.len() + 4);
            for ch in condition.chars() {
                if ch == '?' {
                    self.params.push(v.clone());
                    numbered.push_str(&format!("?{}", self.params.len()));
                } else {
                    numbered.push(ch);
                }
            }
            self.where_clauses.push(numbered);
        }
        self
    }

    /// 添加 ORDER BY 子句
    pub fn order_by(&mut self, order: &str) -> &mut Self {
        self.order_by_clause = Some(order.to_string());
        self
    }

    /// 添加 LIMIT 子句
    pub fn limit(&mut self, n: usize) -> &mut Self {
        self.limit_clause = Some(n);
        self
    }

    /// 添加 OFFSET 子句（需配合 LIMIT）
    pub fn offset(&mut self, n: usize) -> &mut Self {
        self.offset_clause = Some(n);
        self
    }

    /// 已绑定的参数（与 ?N 编号一一对应）
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// 构建 COUNT 查询（共用 WHERE，不带排序分页）
    pub fn build_count(&self, count_select: &str) -> String {
        let mut sql = count_select.to_string();
        self.push_where(&mut sql);
        sql
    }

    /// 构建最终的 SQL 语句
    pub fn build(&self) -> String {
        let mut sql = self.select_clause.clone();
        self.push_where(&mut sql);

        if let Some(ref order) = self.order_by_clause {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = self.limit_clause {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = self.offset_clause {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        sql
    }

    fn push_where(&self, sql: &mut String) {
        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }
    }
}
