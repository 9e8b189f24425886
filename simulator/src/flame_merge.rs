use flame::Span;
use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;

/// Writes the spans recorded on this thread as an html flame graph, with repeated cycles
/// folded into one stack.
pub fn write_flame(path: &Path) -> io::Result<()> {
    let spans = flame::threads()
        .into_iter()
        .next()
        .map(|thread| thread.spans)
        .unwrap_or_default();
    let spans = merge_siblings(spans);
    flame::dump_html_custom(&mut File::create(path)?, &spans)
}

/// Sibling spans sharing a name become one span whose duration is the sum. Children are
/// merged the same way.
fn merge_siblings(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for mut span in spans {
        match merged.iter_mut().find(|m| m.name == span.name) {
            Some(target) => {
                target.delta += span.delta;
                target.children.append(&mut span.children);
            }
            None => merged.push(span),
        }
    }
    for span in &mut merged {
        let children = mem::take(&mut span.children);
        span.children = merge_siblings(children);
    }
    merged
}
