// 该文件是 Lingjing （灵镜） 项目的一部分。
// src/summary.rs - 检测结果摘要
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

pub const NO_OBJECTS: &str = "No objects found";
pub const DEFAULT_MAX_LEN: usize = 25;

/// 生成一行检测摘要，长度按字符计，不超过 `max_len`
pub fn compose<'a, I>(labels: I, max_len: usize) -> String
where
  I: IntoIterator<Item = &'a str>,
{
  let mut distinct: Vec<&str> = Vec::new();
  for label in labels {
    if !distinct.contains(&label) {
      distinct.push(label);
    }
  }

  match distinct.as_slice() {
    [] => NO_OBJECTS.to_string(),
    [only] => format!("Found {only}"),
    _ => truncate(format!("Found {}", distinct.join(", ")), max_len),
  }
}

fn truncate(message: String, max_len: usize) -> String {
  if message.chars().count() <= max_len {
    return message;
  }

  let truncated: String = message.chars().take(max_len).collect();
  let Some(comma) = truncated.rfind(',') else {
    return truncated;
  };

  // 逗号过于靠后时整段丢弃最后一个标签，避免残缺的标签片段
  let comma_index = truncated[..comma].chars().count();
  if comma_index + 3 > max_len {
    let head = &truncated[..comma];
    // 没有更早的逗号时去掉 head 的最后一个字符
    let cut = head
      .rfind(',')
      .or_else(|| head.char_indices().last().map(|(i, _)| i))
      .unwrap_or(0);
    format!("{}...", &head[..cut])
  } else {
    truncated
  }
}
