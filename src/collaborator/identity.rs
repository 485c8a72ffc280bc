// ==========================================
// 身份查询协作方
// ==========================================
// 核心只持有不透明的用户ID，展示信息一律通过此接口解析，不落库

use super::{CollaboratorError, CollaboratorResult};
use crate::domain::types::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// 用户档案（GetUser 的返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// 身份查询接口
pub trait IdentityDirectory: Send + Sync {
    /// 按ID查询用户
    ///
    /// # 返回
    /// - Ok(Some(UserProfile)): 找到
    /// - Ok(None): 用户不存在
    /// - Err: 协作方故障
    fn get_user(&self, user_id: &str) -> CollaboratorResult<Option<UserProfile>>;
}

/// 内存身份目录
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册/覆盖用户
    pub fn upsert(&self, profile: UserProfile) {
        if let Ok(mut users) = self.users.write() {
            users.insert(profile.user_id.clone(), profile);
        }
    }

    /// 便捷注册
    pub fn add_user(&self, user_id: &str, role: Role, display_name: &str, region: Option<&str>) {
        self.upsert(UserProfile {
            user_id: user_id.to_string(),
            role,
            display_name: display_name.to_string(),
            region: region.map(str::to_string),
        });
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn get_user(&self, user_id: &str) -> CollaboratorResult<Option<UserProfile>> {
        let users = self
            .users
            .read()
            .map_err(|e| CollaboratorError::Unavailable(format!("身份目录锁获取失败: {}", e)))?;
        Ok(users.get(user_id).cloned())
    }
}
