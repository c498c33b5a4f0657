//! Tests for the code splitters

use context_index::vector::splitter::{
    language_for_extension, split_blocks, split_windows, CodeChunk, SplitterKind,
};

fn numbered_lines(count: usize, width: usize) -> String {
    (1..=count)
        .map(|i| format!("{:0width$}", i, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_splitter_names_and_defaults() {
    assert_eq!("ast".parse::<SplitterKind>().unwrap(), SplitterKind::Ast);
    assert_eq!(
        " LangChain ".parse::<SplitterKind>().unwrap(),
        SplitterKind::Langchain
    );
    let err = "regex".parse::<SplitterKind>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported splitter 'regex', expected one of: ast, langchain"
    );
    let wrapped = anyhow::Error::new(err);
    assert!(wrapped.downcast_ref::<context_index::vector::UnknownSplitter>().is_some());

    assert_eq!(SplitterKind::default(), SplitterKind::Ast);
    assert_eq!(SplitterKind::Ast.default_settings(), (2500, 300));
    assert_eq!(SplitterKind::Langchain.default_settings(), (1000, 200));
    assert_eq!(SplitterKind::Langchain.to_string(), "langchain");
}

#[test]
fn test_small_content_is_one_chunk() {
    let content = "fn main() {\n    println!(\"hi\");\n}";
    for kind in [SplitterKind::Ast, SplitterKind::Langchain] {
        let chunks = kind.split(content);
        assert_eq!(
            chunks,
            vec![CodeChunk {
                content: content.to_string(),
                start_line: 1,
                end_line: 3,
            }]
        );
    }
}

#[test]
fn test_empty_content_has_no_chunks() {
    assert!(split_windows("", 100, 10).is_empty());
    assert!(split_blocks("\n\n  \n", 100, 10).is_empty());
}

#[test]
fn test_windows_cover_every_line_with_overlap() {
    // 100 lines of 9 chars + newline = 1000 chars
    let content = numbered_lines(100, 9);
    let chunks = split_windows(&content, 200, 40);

    assert!(chunks.len() > 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks.last().unwrap().end_line, 100);

    for pair in chunks.windows(2) {
        // Consecutive windows overlap by a few lines and never skip one
        assert!(pair[1].start_line <= pair[0].end_line);
        assert!(pair[1].start_line > pair[0].start_line);
    }
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 200);
        let first = chunk.content.lines().next().unwrap();
        assert_eq!(first.parse::<usize>().unwrap(), chunk.start_line);
    }
}

#[test]
fn test_long_single_line_is_cut() {
    let content = "x".repeat(250);
    let chunks = split_windows(&content, 100, 0);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.start_line == 1 && c.end_line == 1));
    assert_eq!(chunks[2].content.len(), 50);
}

#[test]
fn test_blocks_break_at_top_level_declarations() {
    let first = "fn alpha() {\n    let a = 1;\n}";
    let second = "fn beta() {\n    let b = 2;\n}";
    let content = format!("{}\n\n{}", first, second);

    // Both blocks fit together
    let packed = split_blocks(&content, 1000, 0);
    assert_eq!(packed.len(), 1);
    assert_eq!((packed[0].start_line, packed[0].end_line), (1, 7));

    // Each block alone fits, but not both
    let separate = split_blocks(&content, 40, 0);
    assert_eq!(separate.len(), 2);
    assert_eq!(separate[0].start_line, 1);
    assert!(separate[0].content.starts_with("fn alpha"));
    assert_eq!(separate[1].start_line, 5);
    assert_eq!(separate[1].end_line, 7);
    assert!(separate[1].content.starts_with("fn beta"));
}

#[test]
fn test_oversized_block_falls_back_to_windows() {
    let body = (0..50)
        .map(|i| format!("    let v{} = {};", i, i))
        .collect::<Vec<_>>()
        .join("\n");
    let content = format!("fn big() {{\n{}\n}}", body);

    let chunks = split_blocks(&content, 300, 50);
    assert!(chunks.len() > 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks.last().unwrap().end_line, 52);
}

#[test]
fn test_language_for_extension() {
    assert_eq!(language_for_extension(".rs"), "rust");
    assert_eq!(language_for_extension("ts"), "typescript");
    assert_eq!(language_for_extension(".PY"), "python");
    assert_eq!(language_for_extension(".unknown"), "text");
    assert_eq!(language_for_extension(""), "text");
}
