// ==========================================
// RosterApi 集成测试
// ==========================================
// 职责: 花名册过滤/分页、身份信息拼接、CSV/PDF 导出
// ==========================================


#[cfg(test)]
mod roster_api_test {
    use enrollment_core::api::{ApiError, RosterApi, RosterFilter, RosterPaging};
    use enrollment_core::collaborator::{
        CollaboratorError, CollaboratorResult, IdentityDirectory, InMemoryIdentityDirectory, UserProfile,
    };
    use enrollment_core::config::config_keys;
    use enrollment_core::domain::types::{EnrollmentStatus, PoolKind};
    use enrollment_core::export::ExportFormat;
    use enrollment_core::repository::PoolRepository;
    use std::sync::Arc;

    use crate::test_helpers::{new_pool, participant, TestEnv};

    /// 对指定参与人返回故障的身份目录
    struct FlakyIdentity {
        inner: Arc<InMemoryIdentityDirectory>,
        failing_id: String,
    }

    impl IdentityDirectory for FlakyIdentity {
        fn get_user(&self, user_id: &str) -> CollaboratorResult<Option<UserProfile>> {
            if user_id == self.failing_id {
                return Err(CollaboratorError::Unavailable("目录超时".to_string()));
            }
            self.inner.get_user(user_id)
        }
    }

    /// 无区域的培训池，P01..P05 报名
    fn seeded(env: &TestEnv) -> String {
        let mut pool = new_pool("Welding Basics", PoolKind::Training, 10);
        pool.region = None;
        let pool_id = env.state.enrollment_api.create_pool("ADMIN", pool).unwrap().pool_id;
        for i in 1..=5 {
            env.state.enrollment_api.enroll(&pool_id, &participant(i)).unwrap();
        }
        pool_id
    }

    #[test]
    fn test_roster_joins_identity_and_keeps_seq_order() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);

        let page = env
            .state
            .roster_api
            .get_roster(Some(&pool_id), &RosterFilter::default(), None, None)
            .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
        let ids: Vec<&str> = page.items.iter().map(|e| e.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["P01", "P02", "P03", "P04", "P05"]);
        assert_eq!(page.items[0].display_name.as_deref(), Some("Participant 01"));
        assert_eq!(page.items[0].region.as_deref(), Some("SUR"));
        assert_eq!(page.items[0].status, Some(EnrollmentStatus::Enrolled));
        assert_eq!(page.items[0].pool_name, "Welding Basics");
    }

    #[test]
    fn test_roster_filters() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);
        let roster = &env.state.roster_api;
        env.state
            .enrollment_api
            .update_enrollment_status("S1", &pool_id, "P02", EnrollmentStatus::Attended)
            .unwrap();

        let by_status = RosterFilter {
            status: Some(EnrollmentStatus::Attended),
            ..RosterFilter::default()
        };
        let page = roster.get_roster(Some(&pool_id), &by_status, None, None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].participant_id, "P02");

        let by_region = RosterFilter {
            region: Some("norte".to_string()),
            ..RosterFilter::default()
        };
        let page = roster.get_roster(Some(&pool_id), &by_region, None, None).unwrap();
        let ids: Vec<&str> = page.items.iter().map(|e| e.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["P02", "P04"]);

        let by_text = RosterFilter {
            free_text: Some("PARTICIPANT 03".to_string()),
            ..RosterFilter::default()
        };
        let page = roster.get_roster(None, &by_text, None, None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].participant_id, "P03");

        let by_pool_name = RosterFilter {
            free_text: Some("welding".to_string()),
            ..RosterFilter::default()
        };
        assert_eq!(roster.get_roster(None, &by_pool_name, None, None).unwrap().total, 5);
    }

    #[test]
    fn test_roster_paging_and_clamping() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);
        let roster = &env.state.roster_api;
        let filter = RosterFilter::default();

        let first = roster.get_roster(Some(&pool_id), &filter, Some(1), Some(2)).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 5);

        let last = roster.get_roster(Some(&pool_id), &filter, Some(3), Some(2)).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].participant_id, "P05");

        let beyond = roster.get_roster(Some(&pool_id), &filter, Some(9), Some(2)).unwrap();
        assert!(beyond.items.is_empty());

        let huge = roster
            .get_roster(Some(&pool_id), &filter, Some(usize::MAX), Some(20))
            .unwrap();
        assert!(huge.items.is_empty());
        assert_eq!(huge.total, 5);
        assert_eq!(huge.page, usize::MAX);

        let clamped = roster.get_roster(Some(&pool_id), &filter, None, Some(10_000)).unwrap();
        assert_eq!(clamped.page_size, 200);

        assert!(matches!(
            roster.get_roster(Some(&pool_id), &filter, Some(0), None),
            Err(ApiError::ValidationError { .. })
        ));
        assert!(matches!(
            roster.get_roster(Some("missing"), &filter, None, None),
            Err(ApiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_identity_failure_blanks_only_that_participant() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);

        let roster = RosterApi::new(
            Arc::new(PoolRepository::new(&env.db_path).unwrap()),
            Arc::new(FlakyIdentity {
                inner: env.identity.clone(),
                failing_id: "P03".to_string(),
            }),
            RosterPaging::default(),
            "zh-CN",
        );

        let page = roster
            .get_roster(Some(&pool_id), &RosterFilter::default(), None, None)
            .unwrap();
        assert_eq!(page.total, 5);
        let p03 = page.items.iter().find(|e| e.participant_id == "P03").unwrap();
        assert!(p03.display_name.is_none());
        assert!(p03.region.is_none());
        let p04 = page.items.iter().find(|e| e.participant_id == "P04").unwrap();
        assert_eq!(p04.display_name.as_deref(), Some("Participant 04"));
    }

    // ==========================================
    // 导出
    // ==========================================

    #[test]
    fn test_export_csv_with_default_locale() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);

        let bytes = env.state.roster_api.export(&pool_id, ExportFormat::Csv).unwrap();
        let mut reader = csv::ReaderBuilder::new().from_reader(bytes.as_slice());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "所属池");
        assert_eq!(&headers[4], "报名状态");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[0][1], "P01");
        assert_eq!(&rows[0][2], "Participant 01");
        assert_eq!(&rows[0][4], "已报名");
    }

    #[test]
    fn test_export_csv_uses_configured_locale() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);
        env.state
            .config_manager
            .set_global_config_value(config_keys::EXPORT_LOCALE, "en")
            .unwrap();

        let handler = env.second_handler();
        let bytes = handler.roster_api.export(&pool_id, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Pool,Participant ID,Name,Region,Status,Enrolled At"
        );
        assert!(lines.next().unwrap().contains(",Enrolled,"));
    }

    #[test]
    fn test_export_program_pool_shows_dash_status() {
        let env = TestEnv::new();
        let pool_id = env.create_pool("项目", PoolKind::Program, 3);
        env.state.enrollment_api.enroll(&pool_id, "P01").unwrap();

        let bytes = env.state.roster_api.export(&pool_id, ExportFormat::Csv).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "-");
    }

    #[test]
    fn test_export_pdf() {
        let env = TestEnv::new();
        let pool_id = seeded(&env);

        let bytes = env.state.roster_api.export(&pool_id, ExportFormat::Pdf).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Welding Basics) Tj"));
        assert!(text.contains("Participant 05"));
        assert!(text.contains("Enrolled"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_export_unknown_pool() {
        let env = TestEnv::new();
        assert!(matches!(
            env.state.roster_api.export("missing", ExportFormat::Pdf),
            Err(ApiError::NotFound { .. })
        ));
        assert_eq!(ExportFormat::parse("PDF"), Some(ExportFormat::Pdf));
        assert_eq!(ExportFormat::parse("xlsx"), None);
    }
}
