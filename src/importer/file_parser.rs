// ==========================================
// 通用报表引擎 - 上传文本解析
// ==========================================
// 职责: 分隔文本 → 表头 + 数据行
// 约定: 首个非空行为表头；其后空行与 '#' 开头的注释行跳过且不计行号
// ==========================================

use crate::importer::error::ImportResult;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

/// 注释标记
pub const COMMENT_MARKER: char = '#';

pub struct UploadParser<'a> {
    records: StringRecordsIntoIter<&'a [u8]>,
}

impl<'a> UploadParser<'a> {
    pub fn new(raw: &'a str, delimiter: u8) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(raw.as_bytes());
        Self {
            records: reader.into_records(),
        }
    }

    /// 读取表头（规范化为小写、去除首尾空白与注释标记）
    ///
    /// # 返回
    /// - None: 文本中没有任何非空行
    pub fn header(&mut self) -> ImportResult<Option<Vec<String>>> {
        for record in self.records.by_ref() {
            let record = record?;
            if is_blank(&record) {
                continue;
            }
            let tokens = record
                .iter()
                .map(|col| {
                    col.trim()
                        .trim_matches(COMMENT_MARKER)
                        .trim()
                        .to_lowercase()
                })
                .collect();
            return Ok(Some(tokens));
        }
        Ok(None)
    }
}

impl Iterator for UploadParser<'_> {
    type Item = ImportResult<StringRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.records.next()? {
                Err(e) => return Some(Err(e.into())),
                Ok(record) if is_blank(&record) || is_comment(&record) => continue,
                Ok(record) => return Some(Ok(record)),
            }
        }
    }
}

// 跳过完全空白的行
fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|v| v.trim().is_empty())
}

fn is_comment(record: &StringRecord) -> bool {
    record
        .get(0)
        .map_or(false, |first| first.starts_with(COMMENT_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_then_data_rows_skip_comments() {
        let raw = "\n#Name, Qty\n\n# a comment\nbolt,5\n,,\nnut,7,extra\n";
        let mut parser = UploadParser::new(raw, b',');
        assert_eq!(
            parser.header().unwrap(),
            Some(vec!["name".to_string(), "qty".to_string()])
        );
        let rows: Vec<StringRecord> = parser.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "bolt");
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_semicolon_and_empty_input() {
        let mut parser = UploadParser::new("name;qty\nbolt;5\n", b';');
        assert_eq!(parser.header().unwrap().unwrap().len(), 2);
        assert_eq!(parser.count(), 1);

        assert_eq!(UploadParser::new("  \n\n", b',').header().unwrap(), None);
    }
}
