// ==========================================
// 通用报表引擎 - CSV 流式导出
// ==========================================
// 职责: 将记录源惰性序列化为三种 CSV 形态之一
// 形态: 列表 / 透视-列表 / 透视-表格
// 约束: 逐行产出，不缓存整个结果集（透视-表格只缓存当前实体的桶槽位）
// 红线: 透视-表格的输入必须按首个行字段排好序，违反时报错而不是静默拆分实体
// 引号: 只有整数/小数不加引号，其余单元格（含空值占位符）一律加引号
// ==========================================

use crate::domain::report::{BucketSpec, ReportDefinition};
use crate::domain::types::{CsvDelimiter, OutputFormat, ReportKind};
use crate::domain::value::{RecordAccess, Value};
use crate::repository::error::RepositoryError;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use encoding_rs::{EncoderResult, Encoding, UTF_8};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info};

/// 空值占位符
pub const NULL_PLACEHOLDER: &str = " ";

/// 透视-表格的"数据字段"列标题
pub const DATA_FIELD_TITLE: &str = "Data field";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV 写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("记录源读取失败: {0}")]
    Source(#[from] RepositoryError),

    #[error("透视导出输入未按首字段排序: 实体 {0} 出现在不相邻的位置")]
    UnsortedPivotInput(String),
}

// ==========================================
// CsvShape - 导出形态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvShape {
    FlatList,
    PivotList,
    PivotTable,
}

impl CsvShape {
    /// 按报表类型与 reporttype 选择形态
    ///
    /// # 返回
    /// - None: 非导出请求
    pub fn select(kind: ReportKind, format: OutputFormat) -> Option<Self> {
        match (kind, format) {
            (_, OutputFormat::Html) => None,
            (ReportKind::List, _) => Some(CsvShape::FlatList),
            (ReportKind::Pivot, OutputFormat::CsvList) => Some(CsvShape::PivotList),
            (ReportKind::Pivot, _) => Some(CsvShape::PivotTable),
        }
    }
}

// ==========================================
// CsvOptions
// ==========================================
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: CsvDelimiter,
    pub encoding: &'static Encoding,
    pub decimal_places: usize,
    pub null_placeholder: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: CsvDelimiter::Comma,
            encoding: UTF_8,
            decimal_places: 2,
            null_placeholder: NULL_PLACEHOLDER.to_string(),
        }
    }
}

impl CsvOptions {
    /// 单元格文本（数值按固定小数位）
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.null_placeholder.clone(),
            Value::Number(n) => format!("{:.*}", self.decimal_places, n),
            other => other.to_string(),
        }
    }

    fn cell(&self, value: &Value) -> Cell {
        Cell {
            text: self.format_value(value),
            numeric: matches!(value, Value::Integer(_) | Value::Number(_)),
        }
    }

    fn null_cell(&self) -> Cell {
        Cell::text(self.null_placeholder.clone())
    }
}

/// 转码为目标编码，丢弃无法编码的字符
pub fn encode_lossy(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 1024];
    let mut src = text;
    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(src, &mut buf, true);
        out.extend_from_slice(&buf[..written]);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull | EncoderResult::Unmappable(_) => {}
        }
    }
    out
}

// 单元格：引号由值的类型决定，而不是由文本内容决定
#[derive(Debug, Clone)]
struct Cell {
    text: String,
    numeric: bool,
}

impl Cell {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            numeric: false,
        }
    }

    fn encode(&self, encoding: &'static Encoding) -> Vec<u8> {
        if self.numeric {
            encode_lossy(&self.text, encoding)
        } else {
            encode_lossy(&format!("\"{}\"", self.text.replace('"', "\"\"")), encoding)
        }
    }
}

// 透视-表格当前实体：每个交叉指标一组桶槽位
struct PivotGroup {
    key: String,
    lead: Value,
    entity: Vec<Cell>,
    slots: Vec<Vec<Cell>>,
    arrived: usize,
}

// ==========================================
// CsvStream - 惰性逐行迭代器
// ==========================================
// 每次 next() 产出一行已编码字节（含换行符）；首行为表头
pub struct CsvStream<'a, I, R> {
    definition: &'a ReportDefinition,
    shape: CsvShape,
    options: CsvOptions,
    buckets: &'a [BucketSpec],
    bucket_slots: HashMap<&'a str, usize>,
    source: I,
    header_done: bool,
    exhausted: bool,
    pending: VecDeque<Vec<u8>>,
    group: Option<PivotGroup>,
    // 上一个实体的首字段值与实体间的排序方向
    previous_lead: Option<Value>,
    trend: Option<Ordering>,
    lines: u64,
    _record: PhantomData<R>,
}

impl<'a, I, R> CsvStream<'a, I, R>
where
    I: Iterator<Item = Result<R, RepositoryError>>,
    R: RecordAccess,
{
    pub fn new(
        definition: &'a ReportDefinition,
        shape: CsvShape,
        options: CsvOptions,
        buckets: &'a [BucketSpec],
        source: I,
    ) -> Self {
        let bucket_slots = buckets
            .iter()
            .enumerate()
            .map(|(slot, b)| (b.name.as_str(), slot))
            .collect();
        Self {
            definition,
            shape,
            options,
            buckets,
            bucket_slots,
            source,
            header_done: false,
            exhausted: false,
            pending: VecDeque::new(),
            group: None,
            previous_lead: None,
            trend: None,
            lines: 0,
            _record: PhantomData,
        }
    }

    fn header_cells(&self) -> Vec<Cell> {
        let def = self.definition;
        let mut titles: Vec<String> = def.rows().iter().map(|r| r.display_title()).collect();
        match self.shape {
            CsvShape::FlatList => {}
            CsvShape::PivotList => {
                titles.extend(def.columns().iter().map(|c| c.display_title()));
                titles.extend(def.crosses().iter().map(|c| c.display_title()));
            }
            CsvShape::PivotTable => {
                titles.push(DATA_FIELD_TITLE.to_string());
                titles.extend(self.buckets.iter().map(|b| b.name.clone()));
            }
        }
        titles.into_iter().map(Cell::text).collect()
    }

    fn record_cells(&self, record: &R) -> Vec<Cell> {
        let def = self.definition;
        let keys: Box<dyn Iterator<Item = &str> + '_> = match self.shape {
            CsvShape::PivotList => Box::new(
                def.rows()
                    .iter()
                    .map(|r| r.key.as_str())
                    .chain(def.columns().iter().map(|c| c.key.as_str()))
                    .chain(def.crosses().iter().map(|c| c.key.as_str())),
            ),
            _ => Box::new(def.rows().iter().map(|r| r.key.as_str())),
        };
        keys.map(|k| self.options.cell(&record.get_value(k))).collect()
    }

    /// 编码一行：每行独立的 writer，flush 后取出字节
    fn encode_line(&mut self, cells: &[Cell]) -> Result<Vec<u8>, ExportError> {
        let encoding = self.options.encoding;
        let mut writer = WriterBuilder::new()
            .delimiter(self.options.delimiter.as_byte())
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(cells.iter().map(|c| c.encode(encoding)))?;
        let line = writer.into_inner().map_err(|e| e.into_error())?;
        self.lines += 1;
        Ok(line)
    }

    fn open_group(&self, key: String, record: &R) -> PivotGroup {
        let def = self.definition;
        let lead = record.get_value(&def.rows()[0].key);
        let entity = def
            .rows()
            .iter()
            .map(|r| self.options.cell(&record.get_value(&r.key)))
            .collect();
        let empty = vec![self.options.null_cell(); self.buckets.len()];
        PivotGroup {
            key,
            lead,
            entity,
            slots: vec![empty; def.crosses().len()],
            arrived: 0,
        }
    }

    /// 按桶字段把记录的交叉指标值放入对应槽位
    fn place(&self, group: &mut PivotGroup, record: &R) {
        let def = self.definition;
        let slot = match def.columns().first() {
            Some(column) => {
                let bucket = record.get_value(&column.key).to_string();
                let slot = self.bucket_slots.get(bucket.as_str()).copied();
                if slot.is_none() {
                    debug!(entity = %group.key, bucket = %bucket, "记录不属于所选时间桶，已跳过");
                }
                slot
            }
            // 没有桶字段时按到达顺序依次填充
            None => Some(group.arrived).filter(|s| *s < self.buckets.len()),
        };
        group.arrived += 1;
        if let Some(slot) = slot {
            for (values, cross) in group.slots.iter_mut().zip(def.crosses()) {
                values[slot] = self.options.cell(&record.get_value(&cross.key));
            }
        }
    }

    /// 实体分组结束：每个交叉指标一行
    fn close_group(&mut self) -> Result<(), ExportError> {
        let Some(group) = self.group.take() else {
            return Ok(());
        };
        for (cross, values) in self.definition.crosses().iter().zip(&group.slots) {
            let mut cells = group.entity.clone();
            cells.push(Cell::text(cross.display_title()));
            cells.extend(values.iter().cloned());
            let line = self.encode_line(&cells)?;
            self.pending.push_back(line);
        }
        self.previous_lead = Some(group.lead);
        Ok(())
    }

    /// 新实体的首字段值必须与之前实体保持同一排序方向
    fn check_order(&mut self, key: &str, lead: &Value) -> Result<(), ExportError> {
        let Some(previous) = &self.previous_lead else {
            return Ok(());
        };
        let step = previous.sort_cmp(lead);
        if step == Ordering::Equal {
            return Ok(());
        }
        match self.trend {
            None => {
                self.trend = Some(step);
                Ok(())
            }
            Some(trend) if trend == step => Ok(()),
            Some(_) => Err(ExportError::UnsortedPivotInput(key.to_string())),
        }
    }

    fn push_pivot_record(&mut self, record: R) -> Result<(), ExportError> {
        let key = record
            .get_value(&self.definition.rows()[0].key)
            .to_string();
        let same_entity = self.group.as_ref().map(|g| g.key == key).unwrap_or(false);
        if !same_entity {
            self.close_group()?;
            let group = self.open_group(key, &record);
            self.check_order(&group.key, &group.lead)?;
            self.group = Some(group);
        }
        if let Some(mut group) = self.group.take() {
            self.place(&mut group, &record);
            self.group = Some(group);
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, ExportError> {
        if !self.header_done {
            self.header_done = true;
            let cells = self.header_cells();
            debug!(report = %self.definition.title(), shape = ?self.shape, "写出 CSV 表头");
            return self.encode_line(&cells).map(Some);
        }

        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.exhausted {
                return Ok(None);
            }
            match self.source.next() {
                None => {
                    self.exhausted = true;
                    if self.shape == CsvShape::PivotTable {
                        self.close_group()?;
                    }
                    info!(
                        report = %self.definition.title(),
                        lines = self.lines,
                        "CSV 导出完成"
                    );
                }
                Some(record) => {
                    let record = record?;
                    if self.shape != CsvShape::PivotTable {
                        let cells = self.record_cells(&record);
                        return self.encode_line(&cells).map(Some);
                    }
                    self.push_pivot_record(record)?;
                }
            }
        }
    }
}
impl<'a, I, R> Iterator for CsvStream<'a, I, R>
where
    I: Iterator<Item = Result<R, RepositoryError>>,
    R: RecordAccess,
{
    type Item = Result<Vec<u8>, ExportError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                // 出错后终止
                self.exhausted = true;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}
