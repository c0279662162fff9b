//! Format templates.
//!
//! A template scans left to right; each escape consumes one stack value
//! in push order. `Stringify` inserts the value's text form, `Ref` a
//! stable reference id.

use dm_ir::{FormatKind, FormatTemplate, TemplatePiece};

use crate::errors::RunResult;
use crate::value::Value;

use super::Interpreter;

impl Interpreter<'_> {
    pub(super) fn op_format_string(&mut self, template: &FormatTemplate) -> RunResult<()> {
        let count = template.interpolation_count();
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop_value()?);
        }
        // Pops arrive newest-first; the first escape takes the value
        // pushed first.
        values.reverse();
        let mut values = values.into_iter();

        let mut out = String::new();
        for piece in &template.pieces {
            match piece {
                TemplatePiece::Text(text) => out.push_str(text),
                TemplatePiece::Interpolate(kind) => {
                    let value = values
                        .next()
                        .unwrap_or_else(|| unreachable!("count matched interpolations"));
                    match kind {
                        FormatKind::Stringify => out.push_str(&value.stringify()),
                        FormatKind::Ref => {
                            let id = value
                                .as_object()
                                .map(|object| self.runtime.ref_id(object))
                                .unwrap_or(0);
                            out.push_str(&format!("[0x{id:08x}]"));
                        }
                    }
                }
            }
        }
        self.push_value(Value::string(out));
        Ok(())
    }
}
