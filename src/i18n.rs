// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// 导出按配置语言显式翻译，不依赖也不修改全局 locale
// ==========================================

/// 默认语言
pub const DEFAULT_LOCALE: &str = "zh-CN";

/// 按指定语言翻译
///
/// # 示例
/// ```no_run
/// use enrollment_core::i18n::t_in;
/// let header = t_in("roster.column.display_name", "en");
/// ```
pub fn t_in(key: &str, locale: &str) -> String {
    rust_i18n::t!(key, locale = locale).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_translate_both_locales() {
        assert_eq!(t_in("status.certified", "en"), "Certified");
        assert_eq!(t_in("status.certified", "zh-CN"), "已认证");
        assert_eq!(t_in("roster.column.display_name", DEFAULT_LOCALE), "姓名");
    }

    #[test]
    fn test_explicit_locale_ignores_global() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        rust_i18n::set_locale("en");
        assert_eq!(t_in("roster.column.display_name", "zh-CN"), "姓名");
        rust_i18n::set_locale(DEFAULT_LOCALE);
        assert_eq!(t_in("roster.total", "en"), "Total");
        assert_eq!(&*rust_i18n::locale(), DEFAULT_LOCALE);
    }
}
