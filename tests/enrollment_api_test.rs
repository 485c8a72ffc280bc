// ==========================================
// EnrollmentApi 集成测试
// ==========================================
// 职责: 报名/退出、培训状态、池管理的端到端行为
// ==========================================


#[cfg(test)]
mod enrollment_api_test {
    use enrollment_core::api::ApiError;
    use enrollment_core::domain::types::{EnrollmentStatus, PoolKind};
    use enrollment_core::engine::NotificationEventType;

    use crate::test_helpers::{new_pool, TestEnv};

    // ==========================================
    // 报名 / 退出
    // ==========================================

    #[test]
    fn test_enroll_until_full_then_withdraw_frees_seat() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("焊接项目", PoolKind::Program, 2);

        assert_eq!(api.enroll(&pool_id, "P01").unwrap(), 1);
        assert_eq!(api.enroll(&pool_id, "P02").unwrap(), 0);

        match api.enroll(&pool_id, "P03") {
            Err(ApiError::PoolFull { seats_remaining, .. }) => assert_eq!(seats_remaining, 0),
            other => panic!("期望 PoolFull，实际: {:?}", other),
        }

        assert_eq!(api.withdraw(&pool_id, "P01").unwrap(), 1);
        assert_eq!(api.enroll(&pool_id, "P03").unwrap(), 0);

        let pool = api.get_pool(&pool_id).unwrap();
        assert_eq!(pool.seats_remaining, 0);
        assert_eq!(pool.seats_taken(), 2);
    }

    #[test]
    fn test_duplicate_enroll_is_rejected_without_consuming_seat() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("电工项目", PoolKind::Program, 3);

        api.enroll(&pool_id, "P01").unwrap();
        match api.enroll(&pool_id, "P01") {
            Err(ApiError::AlreadyEnrolled { seats_remaining, .. }) => assert_eq!(seats_remaining, 2),
            other => panic!("期望 AlreadyEnrolled，实际: {:?}", other),
        }
        assert_eq!(api.get_pool(&pool_id).unwrap().seats_remaining, 2);
    }

    #[test]
    fn test_already_enrolled_reported_before_full() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("满员项目", PoolKind::Program, 1);

        api.enroll(&pool_id, "P01").unwrap();
        assert!(matches!(
            api.enroll(&pool_id, "P01"),
            Err(ApiError::AlreadyEnrolled { .. })
        ));
    }

    #[test]
    fn test_withdraw_not_enrolled_changes_nothing() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("项目", PoolKind::Program, 2);

        match api.withdraw(&pool_id, "P05") {
            Err(ApiError::NotEnrolled { seats_remaining, .. }) => assert_eq!(seats_remaining, 2),
            other => panic!("期望 NotEnrolled，实际: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_pool_and_participant() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("项目", PoolKind::Program, 2);

        let err = api.enroll("no-such-pool", "P01").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = api.enroll(&pool_id, "GHOST").unwrap_err();
        assert!(matches!(err, ApiError::NotFound { ref entity, .. } if entity == "User"));
    }

    #[test]
    fn test_closed_training_rejects_but_program_ignores_flag() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let training = env.create_pool("安全培训", PoolKind::Training, 5);
        let program = env.create_pool("项目", PoolKind::Program, 5);

        api.set_enrollment_open("S1", &training, false).unwrap();
        api.set_enrollment_open("S1", &program, false).unwrap();

        match api.enroll(&training, "P01") {
            Err(ApiError::EnrollmentClosed { seats_remaining, .. }) => assert_eq!(seats_remaining, 5),
            other => panic!("期望 EnrollmentClosed，实际: {:?}", other),
        }
        assert_eq!(api.enroll(&program, "P01").unwrap(), 4);

        api.set_enrollment_open("S1", &training, true).unwrap();
        assert_eq!(api.enroll(&training, "P01").unwrap(), 4);
    }

    #[test]
    fn test_enroll_writes_audit_and_notification() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("项目", PoolKind::Program, 2);

        api.enroll(&pool_id, "P01").unwrap();
        api.withdraw(&pool_id, "P01").unwrap();

        let logs = env.action_log_repo().find_by_target("POOL", &pool_id).unwrap();
        let types: Vec<&str> = logs.iter().map(|l| l.action_type.as_str()).collect();
        assert_eq!(types, vec!["CreatePool", "Enroll", "Withdraw"]);

        let events = env.notifications.events();
        assert!(events
            .iter()
            .any(|e| e.event_type == NotificationEventType::Enrolled && e.recipient_ids == vec!["P01"]));
        assert!(events
            .iter()
            .any(|e| e.event_type == NotificationEventType::Withdrawn));
    }

    // ==========================================
    // 培训报名状态
    // ==========================================

    #[test]
    fn test_training_status_lifecycle() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("急救培训", PoolKind::Training, 3);
        api.enroll(&pool_id, "P01").unwrap();

        let record = api.get_enrollment(&pool_id, "P01").unwrap().unwrap();
        assert_eq!(record.status, EnrollmentStatus::Enrolled);

        for next in [
            EnrollmentStatus::Attended,
            EnrollmentStatus::Completed,
            EnrollmentStatus::Certified,
        ] {
            let updated = api.update_enrollment_status("S1", &pool_id, "P01", next).unwrap();
            assert_eq!(updated.status, next);
        }

        // 状态变更不影响席位
        assert_eq!(api.get_pool(&pool_id).unwrap().seats_remaining, 2);
    }

    #[test]
    fn test_training_status_rejects_backward_edge_and_same_state_is_noop() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("急救培训", PoolKind::Training, 3);
        api.enroll(&pool_id, "P01").unwrap();

        let same = api
            .update_enrollment_status("S1", &pool_id, "P01", EnrollmentStatus::Enrolled)
            .unwrap();
        assert_eq!(same.status, EnrollmentStatus::Enrolled);

        api.update_enrollment_status("S1", &pool_id, "P01", EnrollmentStatus::Absent)
            .unwrap();
        let err = api
            .update_enrollment_status("S1", &pool_id, "P01", EnrollmentStatus::Certified)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStatusTransition { .. }));
        assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");
    }

    #[test]
    fn test_training_status_requires_staff_and_training_pool() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let training = env.create_pool("培训", PoolKind::Training, 3);
        let program = env.create_pool("项目", PoolKind::Program, 3);
        api.enroll(&training, "P01").unwrap();
        api.enroll(&program, "P01").unwrap();

        let err = api
            .update_enrollment_status("U1", &training, "P01", EnrollmentStatus::Attended)
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationError { .. }));

        let err = api
            .update_enrollment_status("S1", &program, "P01", EnrollmentStatus::Attended)
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError { .. }));

        // 项目池成员没有报名记录
        assert!(api.get_enrollment(&program, "P01").unwrap().is_none());
    }

    #[test]
    fn test_withdraw_after_status_change_frees_seat() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("培训", PoolKind::Training, 1);
        api.enroll(&pool_id, "P01").unwrap();
        api.update_enrollment_status("S1", &pool_id, "P01", EnrollmentStatus::Attended)
            .unwrap();

        assert_eq!(api.withdraw(&pool_id, "P01").unwrap(), 1);
        assert!(api.get_enrollment(&pool_id, "P01").unwrap().is_none());
    }

    // ==========================================
    // 池管理
    // ==========================================

    #[test]
    fn test_create_pool_validation_and_permissions() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;

        let err = api
            .create_pool("U1", new_pool("x", PoolKind::Program, 2))
            .unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");

        let err = api
            .create_pool("ADMIN", new_pool("x", PoolKind::Program, 0))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError { .. }));

        let mut with_unknown_owner = new_pool("x", PoolKind::Program, 2);
        with_unknown_owner.responsible_id = Some("GHOST".to_string());
        assert!(matches!(
            api.create_pool("ADMIN", with_unknown_owner),
            Err(ApiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_responsible_party_is_explicitly_nullable() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("项目", PoolKind::Program, 2);
        api.enroll(&pool_id, "P01").unwrap();

        // 已有成员也不会被当作负责人
        assert_eq!(api.get_responsible_party(&pool_id).unwrap(), None);

        api.set_responsible_party("S1", &pool_id, Some("S2")).unwrap();
        assert_eq!(api.get_responsible_party(&pool_id).unwrap().as_deref(), Some("S2"));

        api.set_responsible_party("S1", &pool_id, None).unwrap();
        assert_eq!(api.get_responsible_party(&pool_id).unwrap(), None);
    }

    #[test]
    fn test_delete_pool_blocked_by_sub_projects() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let pool_id = env.create_pool("项目", PoolKind::Program, 2);
        let sub = api.create_sub_project("S1", &pool_id, "一期").unwrap();

        match api.delete_pool("ADMIN", &pool_id) {
            Err(ApiError::DependentResourcesExist { count, .. }) => assert_eq!(count, 1),
            other => panic!("期望 DependentResourcesExist，实际: {:?}", other),
        }

        api.delete_sub_project("S1", &pool_id, &sub.sub_project_id).unwrap();
        api.delete_pool("ADMIN", &pool_id).unwrap();
        assert!(matches!(api.get_pool(&pool_id), Err(ApiError::NotFound { .. })));
    }

    #[test]
    fn test_delete_sub_project_checks_owning_pool() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        let a = env.create_pool("A", PoolKind::Program, 2);
        let b = env.create_pool("B", PoolKind::Program, 2);
        let sub = api.create_sub_project("S1", &a, "一期").unwrap();

        assert!(matches!(
            api.delete_sub_project("S1", &b, &sub.sub_project_id),
            Err(ApiError::NotFound { .. })
        ));
        assert_eq!(api.list_sub_projects(&a).unwrap().len(), 1);
    }

    #[test]
    fn test_list_pools_by_kind() {
        let env = TestEnv::new();
        let api = &env.state.enrollment_api;
        env.create_pool("A", PoolKind::Program, 2);
        env.create_pool("B", PoolKind::Training, 2);
        env.create_pool("C", PoolKind::Training, 2);

        assert_eq!(api.list_pools(None).unwrap().len(), 3);
        assert_eq!(api.list_pools(Some(PoolKind::Training)).unwrap().len(), 2);
    }
}
