// ==========================================
// 对象存储协作方
// ==========================================
// 附件的二进制内容只存在于对象存储中；核心只记录 blob_id/url 元数据。
// 删除事项不会级联清理对象（已知缺口，保持原样）

use super::{CollaboratorError, CollaboratorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// 上传元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub name: String,
    pub content_type: Option<String>,
    pub uploader_id: String,
}

/// 上传结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHandle {
    pub blob_id: String,
    pub url: String,
}

/// 对象存储接口
pub trait BlobStore: Send + Sync {
    /// 上传对象
    fn put_blob(&self, bytes: Vec<u8>, metadata: BlobMetadata) -> CollaboratorResult<BlobHandle>;

    /// 读取对象
    fn get_blob(&self, blob_id: &str) -> CollaboratorResult<Vec<u8>>;

    /// 判断对象是否存在（默认实现基于 get_blob）
    fn blob_exists(&self, blob_id: &str) -> CollaboratorResult<bool> {
        match self.get_blob(blob_id) {
            Ok(_) => Ok(true),
            Err(CollaboratorError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    #[allow(dead_code)]
    metadata: BlobMetadata,
}

/// 内存对象存储
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存对象数量
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put_blob(&self, bytes: Vec<u8>, metadata: BlobMetadata) -> CollaboratorResult<BlobHandle> {
        let blob_id = uuid::Uuid::new_v4().to_string();
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| CollaboratorError::Unavailable(format!("对象存储锁获取失败: {}", e)))?;
        blobs.insert(blob_id.clone(), StoredBlob { bytes, metadata });

        Ok(BlobHandle {
            url: format!("mem://blobs/{}", blob_id),
            blob_id,
        })
    }

    fn get_blob(&self, blob_id: &str) -> CollaboratorResult<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| CollaboratorError::Unavailable(format!("对象存储锁获取失败: {}", e)))?;
        blobs
            .get(blob_id)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| CollaboratorError::NotFound(blob_id.to_string()))
    }
}
