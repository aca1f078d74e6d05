// ==========================================
// 通用报表引擎 - 分页器
// ==========================================
// 职责: 计算分页窗口，生成折叠省略号的页码链接序列
// 约束: 页码 1 基；首尾各显示 on_ends 页，当前页两侧各 on_each_side 页
// ==========================================

use crate::domain::request::{RequestContext, PAGE_PARAM};
use serde::Serialize;
use thiserror::Error;

/// 首尾显示页数
pub const ON_ENDS: u64 = 2;

/// 当前页两侧显示页数
pub const ON_EACH_SIDE: u64 = 3;

/// 不超过该页数时全部显示
pub const SHOW_ALL_THRESHOLD: u64 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("页码 {page} 超出范围 (共 {total_pages} 页)")]
    OutOfRange { page: i64, total_pages: u64 },

    #[error("无效页码: {0}")]
    InvalidPage(String),
}

// ==========================================
// PageWindow - 分页窗口
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
}

impl PageWindow {
    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(self.page_size)
    }

    /// 切片起点（0 基偏移）
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    /// 本页首条记录序号（1 基；无记录时为 0）
    pub fn start_index(&self) -> u64 {
        if self.total_count == 0 {
            0
        } else {
            self.offset() + 1
        }
    }

    /// 本页末条记录序号（1 基）
    pub fn end_index(&self) -> u64 {
        (self.offset() + self.page_size).min(self.total_count)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// 页码序列中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageItem {
    Page(u64),
    Ellipsis,
}

/// 页码链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageLink {
    /// 当前页（纯文本）
    Current(u64),
    Link { page: u64, href: String },
    Ellipsis,
}

// ==========================================
// Paginator
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub page_size: u64,
    pub on_ends: u64,
    pub on_each_side: u64,
}

impl Paginator {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            on_ends: ON_ENDS,
            on_each_side: ON_EACH_SIDE,
        }
    }

    pub fn with_window(mut self, on_ends: u64, on_each_side: u64) -> Self {
        self.on_ends = on_ends;
        self.on_each_side = on_each_side;
        self
    }

    /// 解析 p 参数（缺省为第 1 页）
    pub fn parse_page(raw: Option<&str>) -> Result<i64, PaginationError> {
        match raw {
            None => Ok(1),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| PaginationError::InvalidPage(raw.to_string())),
        }
    }

    /// 计算分页窗口
    ///
    /// 无记录时允许第 1 页。
    ///
    /// # 返回
    /// - Err(OutOfRange): page < 1 或 page > 总页数
    pub fn window(&self, total_count: u64, page: i64) -> Result<PageWindow, PaginationError> {
        let total_pages = total_count.div_ceil(self.page_size);
        if page < 1 || page as u64 > total_pages.max(1) {
            return Err(PaginationError::OutOfRange { page, total_pages });
        }
        Ok(PageWindow {
            page: page as u64,
            page_size: self.page_size,
            total_count,
        })
    }

    /// 页码序列
    pub fn page_numbers(&self, current: u64, total_pages: u64) -> Vec<PageItem> {
        if total_pages <= SHOW_ALL_THRESHOLD {
            return (1..=total_pages).map(PageItem::Page).collect();
        }

        let (ends, side) = (self.on_ends, self.on_each_side);
        let head = (1, ends.min(total_pages));
        let tail = (total_pages.saturating_sub(ends) + 1, total_pages);
        let segments = if current <= ends + side + 1 {
            vec![(1, current + side), tail]
        } else if current + side + ends >= total_pages {
            vec![head, (current - side, total_pages)]
        } else {
            vec![head, (current - side, current + side), tail]
        };

        let mut items = Vec::new();
        let mut last = 0u64;
        for (start, end) in segments {
            let end = end.min(total_pages);
            let start = start.max(last + 1);
            if start > end {
                continue;
            }
            if last > 0 && start > last + 1 {
                items.push(PageItem::Ellipsis);
            }
            items.extend((start..=end).map(PageItem::Page));
            last = end;
        }
        items
    }

    /// 页码链接序列（保留除 p 以外的全部参数；第 1 页链接不带 p）
    pub fn links(&self, window: &PageWindow, ctx: &RequestContext) -> Vec<PageLink> {
        let mut params = ctx.params.clone();
        params.remove(PAGE_PARAM);

        self.page_numbers(window.page, window.total_pages())
            .into_iter()
            .map(|item| match item {
                PageItem::Ellipsis => PageLink::Ellipsis,
                PageItem::Page(n) if n == window.page => PageLink::Current(n),
                PageItem::Page(n) => {
                    let mut link_params = params.clone();
                    if n > 1 {
                        link_params.set(PAGE_PARAM, n.to_string());
                    }
                    PageLink::Link {
                        page: n,
                        href: ctx.href(&link_params),
                    }
                }
            })
            .collect()
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(crate::domain::report::DEFAULT_PAGE_SIZE as u64)
    }
}
