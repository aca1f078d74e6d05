// ==========================================
// 通用报表引擎 - API 层
// ==========================================
// 职责: 请求级编排（渲染 / 导出 / 上传）与错误分类
// ==========================================

pub mod error;
pub mod report_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use report_api::{
    ExportPlan, ReportApi, ReportOutput, ReportPage, UploadResponse, UploadStatus, ANONYMOUS_USER,
};
