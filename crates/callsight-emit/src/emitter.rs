use anyhow::Result;
use std::io::Write;

pub type EmitResult = Result<()>;

/// Indentation and colouring state threaded through a textual emitter.
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub indent_level: usize,
    pub indent_chars: String,
    pub use_colors: bool,
}

impl EmitContext {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_chars: "    ".to_string(),
            use_colors: false,
        }
    }

    pub fn colored() -> Self {
        Self {
            use_colors: true,
            ..Self::new()
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn get_indent(&self) -> String {
        self.indent_chars.repeat(self.indent_level)
    }
}

impl Default for EmitContext {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emitter {
    type Item: ?Sized;

    fn emit<W: Write>(
        &self,
        item: &Self::Item,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult;

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::new();
        self.emit(item, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Colour roles used by the textual emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Header,
    Label,
    Comment,
    Call,
    Terminator,
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(writer: &mut W, context: &EmitContext, text: &str) -> EmitResult {
        writeln!(writer, "{}{}", context.get_indent(), text)?;
        Ok(())
    }

    pub fn write_toned_line<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        text: &str,
        tone: Tone,
    ) -> EmitResult {
        if !context.use_colors {
            return Self::write_line(writer, context, text);
        }
        use colored::Colorize;
        let painted = match tone {
            Tone::Header => text.bold().to_string(),
            Tone::Label => text.cyan().to_string(),
            Tone::Comment => text.green().to_string(),
            Tone::Call => text.yellow().to_string(),
            Tone::Terminator => text.magenta().to_string(),
        };
        writeln!(writer, "{}{}", context.get_indent(), painted)?;
        Ok(())
    }

    pub fn write_comment<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        comment: &str,
    ) -> EmitResult {
        Self::write_toned_line(writer, context, &format!("// {}", comment), Tone::Comment)
    }

    pub fn write_block<W: Write, F>(
        writer: &mut W,
        context: &mut EmitContext,
        header: &str,
        body: F,
    ) -> EmitResult
    where
        F: FnOnce(&mut W, &mut EmitContext) -> EmitResult,
    {
        Self::write_toned_line(writer, context, &format!("{} {{", header), Tone::Header)?;
        context.indent();
        body(writer, context)?;
        context.dedent();
        Self::write_line(writer, context, "}")?;
        Ok(())
    }
}
