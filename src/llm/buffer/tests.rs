use super::*;

fn feed(tokens: &[&str]) -> Vec<String> {
    let mut buffer = ChunkBuffer::new();
    let mut chunks: Vec<String> = tokens.iter().filter_map(|t| buffer.push(t)).collect();
    chunks.extend(buffer.finish());
    chunks
}

#[test]
fn partial_words_wait_for_whitespace() {
    let mut buffer = ChunkBuffer::new();

    assert_eq!(buffer.push("Pre"), None);
    assert_eq!(buffer.push("heat"), None);
    assert_eq!(buffer.push(" the"), Some("Preheat ".to_string()));
    assert_eq!(buffer.pending(), "the");
    assert_eq!(buffer.push(" oven\n"), Some("the oven\n".to_string()));
    assert_eq!(buffer.pending(), "");
}

#[test]
fn links_are_held_until_closed() {
    let mut buffer = ChunkBuffer::new();

    assert_eq!(buffer.push("See ["), Some("See ".to_string()));
    assert_eq!(buffer.state(), LinkState::InLinkText);
    assert_eq!(buffer.push("the full "), None);
    assert_eq!(buffer.push("recipe]("), None);
    assert_eq!(buffer.state(), LinkState::InLinkUrl);
    assert_eq!(buffer.push("https://example.com/a b"), None);
    assert_eq!(
        buffer.push(")"),
        Some("[the full recipe](https://example.com/a b)".to_string())
    );
    assert_eq!(buffer.state(), LinkState::Text);
}

#[test]
fn bracket_without_url_is_plain_text() {
    let chunks = feed(&["[note]", " keep", " going"]);
    assert_eq!(chunks, vec!["[note] ", "keep ", "going"]);
}

#[test]
fn finish_releases_unterminated_link() {
    let mut buffer = ChunkBuffer::new();
    assert_eq!(buffer.push("[dangling"), None);
    assert_eq!(buffer.finish(), Some("[dangling".to_string()));
    assert_eq!(buffer.finish(), None);
    assert_eq!(buffer.state(), LinkState::Text);
}

#[test]
fn emitted_text_reassembles_the_stream() {
    let tokens = ["1.", " Boil", " water", ".\n", "2.", " Add [pasta](", "/p)", "!"];
    let chunks = feed(&tokens);
    assert_eq!(chunks.concat(), tokens.concat());
}

#[test]
fn flushed_text_is_cleaned() {
    let chunks = feed(&["Mix   well  \n   then ", "bake"]);
    assert_eq!(chunks, vec!["Mix well\nthen ", "bake"]);
}

#[test]
fn newline_ends_an_unclosed_link() {
    let mut buffer = ChunkBuffer::new();

    assert_eq!(buffer.push("Try ["), Some("Try ".to_string()));
    assert_eq!(buffer.push("this one\nand "), Some("[this one\nand ".to_string()));
    assert_eq!(buffer.state(), LinkState::Text);
    assert_eq!(buffer.pending(), "");

    assert_eq!(buffer.push("[x]("), None);
    assert_eq!(buffer.push("/half\n"), Some("[x](/half\n".to_string()));
    assert_eq!(buffer.state(), LinkState::Text);
}

#[test]
fn whitespace_is_cleaned_across_flushes() {
    assert_eq!(feed(&["a ", " b"]), vec!["a ", "b"]);
    assert_eq!(feed(&["one\n", "   two"]), vec!["one\n", "two"]);
    assert_eq!(feed(&["end.\n", "\nNext"]), vec!["end.\n", "Next"]);
    assert_eq!(feed(&["x ", "  "]), vec!["x "]);
}

#[test]
fn finish_forgets_the_previous_tail() {
    let mut buffer = ChunkBuffer::new();
    assert_eq!(buffer.push("done "), Some("done ".to_string()));
    assert_eq!(buffer.finish(), None);
    assert_eq!(buffer.push(" again "), Some(" again ".to_string()));
}

#[test]
fn clean_streamed_text_rules() {
    assert_eq!(clean_streamed_text("a    b"), "a b");
    assert_eq!(clean_streamed_text("line \t\nnext"), "line\nnext");
    assert_eq!(clean_streamed_text("line\n    next"), "line\nnext");
    assert_eq!(clean_streamed_text("plain text"), "plain text");
}

#[test]
fn link_state_transitions() {
    assert_eq!(LinkState::Text.next('['), (LinkState::InLinkText, false));
    assert_eq!(LinkState::InLinkText.next(' '), (LinkState::InLinkText, false));
    assert_eq!(LinkState::LinkTextClosed.next('x'), (LinkState::Text, false));
    assert_eq!(LinkState::LinkTextClosed.next('['), (LinkState::InLinkText, false));
    assert_eq!(LinkState::InLinkUrl.next(')'), (LinkState::Text, true));
    assert_eq!(LinkState::InLinkText.next('\n'), (LinkState::Text, false));
    assert_eq!(LinkState::InLinkUrl.next('\n'), (LinkState::Text, false));
}
