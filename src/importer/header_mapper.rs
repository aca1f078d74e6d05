// ==========================================
// 通用报表引擎 - 表头映射器
// ==========================================
// 职责: 表头列 → 导入字段映射
// 红线: 表头错误在写入任何数据之前中止导入
// ==========================================

use crate::domain::import::{ImportFailure, ImportSchema};
use csv::StringRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    /// 每列对应的字段下标；None 表示该列忽略（空表头或只读字段）
    slots: Vec<Option<usize>>,
    primary_key_mapped: bool,
}

impl HeaderMap {
    /// 由规范化后的表头建立映射
    ///
    /// # 参数
    /// - `schema`: 导入模式
    /// - `tokens`: 表头列（已小写并去除注释标记）
    ///
    /// # 返回
    /// - Err: 全部表头错误（未知字段 + 缺少主键）
    pub fn build(schema: &ImportSchema, tokens: &[String]) -> Result<Self, Vec<ImportFailure>> {
        let mut errors = Vec::new();
        let mut slots = Vec::with_capacity(tokens.len());
        let mut primary_key_mapped = false;

        for token in tokens {
            if token.is_empty() {
                slots.push(None);
                continue;
            }
            match schema.fields.iter().position(|f| f.matches_header(token)) {
                Some(i) => {
                    let field = &schema.fields[i];
                    let is_pk = field.name == schema.primary_key;
                    primary_key_mapped |= is_pk;
                    slots.push((field.editable || is_pk).then_some(i));
                }
                None => {
                    errors.push(ImportFailure::unknown_field(token));
                    slots.push(None);
                }
            }
        }

        if !primary_key_mapped && !schema.auto_primary_key {
            errors.push(ImportFailure::missing_primary_key(&schema.primary_key));
        }

        if errors.is_empty() {
            Ok(Self {
                slots,
                primary_key_mapped,
            })
        } else {
            Err(errors)
        }
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key_mapped
    }

    /// 数据行中已映射字段的 (字段下标, 原始值)
    ///
    /// 多出表头的单元格忽略；行过短时缺失的字段不出现
    pub fn values<'r>(&self, row: &'r StringRecord) -> Vec<(usize, &'r str)> {
        self.slots
            .iter()
            .zip(row.iter())
            .filter_map(|(slot, cell)| slot.map(|i| (i, cell.trim())))
            .collect()
    }
}
