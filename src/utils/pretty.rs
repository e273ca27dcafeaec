//! Pretty printing utilities for IR trees and generated code.

use crate::ir::node::{Access, Node};
use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use std::fmt;

/// Default line width for pretty printing.
pub const DEFAULT_WIDTH: usize = 80;

/// Nesting width of the IR tree dump.
pub const TREE_INDENT: isize = 4;

/// A pretty-printable value.
pub trait PrettyPrint {
    /// Convert to a pretty document.
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D>;

    /// Pretty print to a string with the given width.
    fn pretty_print(&self, width: usize) -> String {
        let allocator = BoxAllocator;
        let doc = self.to_doc(&allocator).into_doc();
        let mut output = String::new();
        // Rendering into a String cannot fail.
        let _ = doc.render_fmt(width, &mut output);
        output
    }

    /// Pretty print with default width.
    fn pretty(&self) -> String {
        self.pretty_print(DEFAULT_WIDTH)
    }
}

fn access_text(acc: &Access) -> String {
    let indices = format_list(acc.indices(), ", ");
    format!("{}[{}]", acc.tensor().name(), indices)
}

/// One line per node, children nested four spaces deeper:
///
/// ```text
/// LOOP: for i = 0 to N step 1
///     ASSIGN
///         STORE (Target): C[i]
///         LOAD: A[i]
/// ```
impl PrettyPrint for Node {
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        let (header, children): (String, Vec<&Node>) = match self {
            Node::Const(lit) => (format!("CONST: {}", lit), Vec::new()),
            Node::Variable(name) => (format!("VAR: {}", name), Vec::new()),
            Node::ScalarRef(name) => (format!("SCALAR: {}", name), Vec::new()),
            Node::Add { lhs, rhs } => ("ADD".to_string(), vec![lhs.as_ref(), rhs.as_ref()]),
            Node::Mul { lhs, rhs } => ("MUL".to_string(), vec![lhs.as_ref(), rhs.as_ref()]),
            Node::Min { lhs, rhs } => ("MIN".to_string(), vec![lhs.as_ref(), rhs.as_ref()]),
            Node::Load(acc) => (format!("LOAD: {}", access_text(acc)), Vec::new()),
            Node::Store(acc) => (format!("STORE (Target): {}", access_text(acc)), Vec::new()),
            Node::Assign(assign) => ("ASSIGN".to_string(), vec![assign.target(), assign.value()]),
            Node::Loop(lp) => (
                format!("LOOP: for {} = {} to {} step {}", lp.index, lp.lower, lp.upper, lp.step),
                lp.body.iter().collect(),
            ),
        };

        let nested = allocator.concat(
            children
                .into_iter()
                .map(|child| allocator.hardline().append(child.to_doc(allocator))),
        );
        allocator.text(header).append(nested.nest(TREE_INDENT))
    }
}

/// A simple code formatter for generated code.
#[derive(Debug)]
pub struct CodeFormatter {
    output: String,
    indent_level: usize,
    indent_str: String,
    at_line_start: bool,
}

impl CodeFormatter {
    /// Create a new formatter with the given indent string.
    pub fn new(indent_str: &str) -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            indent_str: indent_str.to_string(),
            at_line_start: true,
        }
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write text.
    pub fn write(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.output.push('\n');
                self.at_line_start = true;
            } else {
                if self.at_line_start {
                    for _ in 0..self.indent_level {
                        self.output.push_str(&self.indent_str);
                    }
                    self.at_line_start = false;
                }
                self.output.push(c);
            }
        }
    }

    /// Write a line.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.write("\n");
    }

    /// Write an empty line.
    pub fn newline(&mut self) {
        self.write("\n");
    }

    /// Get the formatted output.
    pub fn finish(self) -> String {
        self.output
    }

    /// Get a reference to the current output.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl fmt::Write for CodeFormatter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// Format a list with separators.
pub fn format_list<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
