// ==========================================
// 通用报表引擎 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 导入产生的所有写入必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
pub(crate) use core::insert_entry;
