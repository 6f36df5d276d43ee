//! 模块 ID 与激活实例 ID
//!
//! 模块 ID 由模块作者指定，是不透明字符串，要求稳定且全局唯一；
//! 内核只约束长度和可打印性，不强制具体命名风格（短横线风格和
//! 大括号 GUID 均可）。激活实例 ID 在每次激活时生成，用于在日志中
//! 区分同一模块的多次激活。

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// 62 进制字符集
const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 激活实例 ID 长度
const ACTIVATION_ID_LENGTH: usize = 10;

/// 模块 ID 最大长度
const MODULE_ID_MAX_LENGTH: usize = 64;

/// 生成 10 位 62 进制激活实例 ID
///
/// 使用时间戳 + 随机数组合，确保唯一性
///
/// # Example
///
/// ```
/// use veneer_core::utils::id::generate_activation_id;
///
/// let id = generate_activation_id();
/// assert_eq!(id.len(), 10);
/// ```
pub fn generate_activation_id() -> String {
    let mut rng = rand::thread_rng();

    // 获取当前时间戳（毫秒）
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    // 生成随机数
    let random: u64 = rng.gen();

    // 组合时间戳和随机数
    let mut value = timestamp ^ random;

    // 转换为 62 进制
    let mut result = Vec::with_capacity(ACTIVATION_ID_LENGTH);
    for _ in 0..ACTIVATION_ID_LENGTH {
        let index = (value % 62) as usize;
        result.push(BASE62_CHARS[index]);
        value /= 62;
    }

    // 反转得到最终 ID
    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// 验证模块 ID 格式是否有效
///
/// 模块 ID 是不透明字符串：非空、不超过 64 字符、不含空白和控制
/// 字符。短横线风格（`schedule-date-picker`）和大括号 GUID
/// （`{2e5e7964-ff75-4bd9-925a-fd7e9b024c69}`）都是合法 ID。
///
/// # Example
///
/// ```
/// use veneer_core::utils::id::is_valid_module_id;
///
/// assert!(is_valid_module_id("schedule-date-picker"));
/// assert!(is_valid_module_id("{2e5e7964-ff75-4bd9-925a-fd7e9b024c69}"));
/// assert!(!is_valid_module_id("schedule date picker"));
/// ```
pub fn is_valid_module_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MODULE_ID_MAX_LENGTH {
        return false;
    }

    id.chars().all(|c| !c.is_whitespace() && !c.is_control())
}
