//! §6.1/§6.2 wire format: a bit-exact whitespace-tokenized parser/emitter for
//! the preprocessor's input and output text formats.

use crate::ids::{OpId, Value, VarId};
use crate::model::{Axiom, Effect, Fact, MutexGroup, Operator, Task, Variable};
use crate::PreprocessedTask;
use sas_collections::ref_store::RefStore;
use std::io::{BufRead, BufReader, Read, Write};
use thiserror::Error;

/// The only version this parser accepts (spec.md §6.1: "must equal expected version").
pub const EXPECTED_VERSION: i64 = 3;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected `{expected}`, found `{found}`")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: expected an integer, found `{found}`")]
    ExpectedInteger { line: usize, found: String },
    #[error("unexpected end of input, expected `{expected}`")]
    UnexpectedEof { expected: String },
    #[error("version mismatch: expected {expected}, found {found} (did you run the matching translator?)")]
    VersionMismatch { expected: i64, found: i64 },
}

/// A whitespace/newline tokenizer that tracks line numbers for diagnostics. The
/// wire format has one logical token per line in practice, but the grammar does
/// not require that, so tokens are split purely on whitespace.
struct Tokenizer<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    pos: usize,
    line_no: usize,
    eof: bool,
}

impl<R: BufRead> Tokenizer<R> {
    fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            line: Vec::new(),
            pos: 0,
            line_no: 0,
            eof: false,
        }
    }

    fn fill_line(&mut self) -> std::io::Result<()> {
        while self.pos >= self.line.len() {
            self.line.clear();
            self.pos = 0;
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                self.eof = true;
                return Ok(());
            }
            self.line_no += 1;
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Option<String>, ParseError> {
        loop {
            self.fill_line().map_err(|_| ParseError::UnexpectedEof {
                expected: "token".into(),
            })?;
            if self.eof {
                return Ok(None);
            }
            while self.pos < self.line.len() && self.line[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.line.len() {
                continue;
            }
            let start = self.pos;
            while self.pos < self.line.len() && !self.line[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let tok = String::from_utf8_lossy(&self.line[start..self.pos]).into_owned();
            return Ok(Some(tok));
        }
    }

    /// Reads an entire line verbatim (used for names, which may contain spaces).
    /// Always advances to the start of the *next* line first, since the wire
    /// format places `<name>` alone on its own line.
    fn rest_of_line(&mut self) -> Result<String, ParseError> {
        self.pos = self.line.len();
        self.fill_line().map_err(|_| ParseError::UnexpectedEof {
            expected: "line".into(),
        })?;
        if self.eof {
            return Err(ParseError::UnexpectedEof { expected: "line".into() });
        }
        let text = String::from_utf8_lossy(&self.line)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        self.pos = self.line.len();
        Ok(text)
    }

    fn expect(&mut self, expected: &str) -> Result<(), ParseError> {
        match self.next_token()? {
            Some(tok) if tok == expected => Ok(()),
            Some(found) => Err(ParseError::UnexpectedToken {
                line: self.line_no,
                expected: expected.to_string(),
                found,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        match self.next_token()? {
            Some(tok) => tok.parse::<i64>().map_err(|_| ParseError::ExpectedInteger {
                line: self.line_no,
                found: tok,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "integer".into(),
            }),
        }
    }

    fn expect_token(&mut self) -> Result<String, ParseError> {
        self.next_token()?.ok_or(ParseError::UnexpectedEof {
            expected: "token".into(),
        })
    }
}

fn parse_facts<R: BufRead>(tok: &mut Tokenizer<R>, count: i64) -> Result<Vec<(i64, i64)>, ParseError> {
    let mut facts = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let var = tok.expect_int()?;
        let value = tok.expect_int()?;
        facts.push((var, value));
    }
    Ok(facts)
}

/// A single effect as it appears on the wire: effect conditions, the optional
/// precondition value on the effect's own variable (`-1` means none), and the
/// postcondition (new) value.
pub struct WireEffect {
    pub conditions: Vec<(i64, i64)>,
    pub var: i64,
    pub pre: i64,
    pub post: i64,
}

pub struct WireOperator {
    pub name: String,
    pub prevail: Vec<(i64, i64)>,
    pub effects: Vec<WireEffect>,
    pub cost: i64,
}

pub struct WireAxiom {
    pub conditions: Vec<(i64, i64)>,
    pub var: i64,
    pub old: i64,
    pub new: i64,
}

pub struct WireVariable {
    pub name: String,
    pub axiom_layer: i64,
    pub domain_size: i64,
    pub value_names: Vec<String>,
}

/// The task exactly as read off the wire, before translation into the
/// in-memory model: every variable/operator/fact index is a raw `i64` as
/// written in the file, unresolved against any `VarId`/`OpId` space.
pub struct ParsedTask {
    pub version: i64,
    pub uses_metric: bool,
    pub variables: Vec<WireVariable>,
    pub mutex_groups: Vec<Vec<(i64, i64)>>,
    pub initial_state: Vec<i64>,
    pub goal: Vec<(i64, i64)>,
    pub operators: Vec<WireOperator>,
    pub axioms: Vec<WireAxiom>,
}

/// Parses the §6.1 preprocessor input format.
pub fn parse(reader: impl Read) -> Result<ParsedTask, ParseError> {
    let mut tok = Tokenizer::new(BufReader::new(reader));

    tok.expect("begin_version")?;
    let version = tok.expect_int()?;
    if version != EXPECTED_VERSION {
        return Err(ParseError::VersionMismatch {
            expected: EXPECTED_VERSION,
            found: version,
        });
    }
    tok.expect("end_version")?;

    tok.expect("begin_metric")?;
    let uses_metric = tok.expect_int()? != 0;
    tok.expect("end_metric")?;

    let num_variables = tok.expect_int()?;
    let mut variables = Vec::with_capacity(num_variables.max(0) as usize);
    for _ in 0..num_variables {
        tok.expect("begin_variable")?;
        let name = tok.expect_token()?;
        let axiom_layer = tok.expect_int()?;
        let domain_size = tok.expect_int()?;
        let mut value_names = Vec::with_capacity(domain_size.max(0) as usize);
        for _ in 0..domain_size {
            value_names.push(tok.rest_of_line()?);
        }
        tok.expect("end_variable")?;
        variables.push(WireVariable {
            name,
            axiom_layer,
            domain_size,
            value_names,
        });
    }

    let num_mutex_groups = tok.expect_int()?;
    let mut mutex_groups = Vec::with_capacity(num_mutex_groups.max(0) as usize);
    for _ in 0..num_mutex_groups {
        tok.expect("begin_mutex_group")?;
        let n = tok.expect_int()?;
        let facts = parse_facts(&mut tok, n)?;
        tok.expect("end_mutex_group")?;
        mutex_groups.push(facts);
    }

    tok.expect("begin_state")?;
    let mut initial_state = Vec::with_capacity(num_variables.max(0) as usize);
    for _ in 0..num_variables {
        initial_state.push(tok.expect_int()?);
    }
    tok.expect("end_state")?;

    tok.expect("begin_goal")?;
    let n_goal = tok.expect_int()?;
    let goal = parse_facts(&mut tok, n_goal)?;
    tok.expect("end_goal")?;

    let num_operators = tok.expect_int()?;
    let mut operators = Vec::with_capacity(num_operators.max(0) as usize);
    for _ in 0..num_operators {
        tok.expect("begin_operator")?;
        let name = tok.rest_of_line()?;
        let num_prevail = tok.expect_int()?;
        let prevail = parse_facts(&mut tok, num_prevail)?;
        let num_effects = tok.expect_int()?;
        let mut effects = Vec::with_capacity(num_effects.max(0) as usize);
        for _ in 0..num_effects {
            let num_conditions = tok.expect_int()?;
            let conditions = parse_facts(&mut tok, num_conditions)?;
            let var = tok.expect_int()?;
            let pre = tok.expect_int()?;
            let post = tok.expect_int()?;
            effects.push(WireEffect {
                conditions,
                var,
                pre,
                post,
            });
        }
        let cost = tok.expect_int()?;
        tok.expect("end_operator")?;
        operators.push(WireOperator {
            name,
            prevail,
            effects,
            cost,
        });
    }

    let num_axioms = tok.expect_int()?;
    let mut axioms = Vec::with_capacity(num_axioms.max(0) as usize);
    for _ in 0..num_axioms {
        tok.expect("begin_rule")?;
        let num_conditions = tok.expect_int()?;
        let conditions = parse_facts(&mut tok, num_conditions)?;
        let var = tok.expect_int()?;
        let old = tok.expect_int()?;
        let new = tok.expect_int()?;
        tok.expect("end_rule")?;
        axioms.push(WireAxiom { conditions, var, old, new });
    }

    Ok(ParsedTask {
        version,
        uses_metric,
        variables,
        mutex_groups,
        initial_state,
        goal,
        operators,
        axioms,
    })
}

/// Translates a `ParsedTask` into the in-memory model, resolving raw `i64`
/// indices into `VarId`/`OpId`s.
pub fn to_task(parsed: &ParsedTask) -> anyhow::Result<Task> {
    let var_id = |i: i64| -> VarId { VarId::from(i as usize) };

    let mut variables: RefStore<VarId, Variable> = RefStore::new();
    for wv in &parsed.variables {
        variables.push(Variable {
            name: wv.name.clone(),
            domain_size: wv.domain_size as u32,
            axiom_layer: wv.axiom_layer as i32,
            default_value: 0,
            level: -1,
            necessary: true,
            value_names: wv.value_names.clone(),
        });
    }

    let mut operators: RefStore<OpId, Operator> = RefStore::new();
    for wo in &parsed.operators {
        let preconditions: Vec<Fact> = wo
            .prevail
            .iter()
            .map(|&(v, val)| Fact::new(var_id(v), val as Value))
            .collect();
        let effects: Vec<Effect> = wo
            .effects
            .iter()
            .map(|we| Effect {
                fact: Fact::new(var_id(we.var), we.post as Value),
                precondition_value: if we.pre < 0 { None } else { Some(we.pre as Value) },
                conditions: we.conditions.iter().map(|&(v, val)| Fact::new(var_id(v), val as Value)).collect(),
            })
            .collect();
        operators.push(Operator {
            name: wo.name.clone(),
            preconditions,
            effects,
            cost: wo.cost as u32,
        });
    }

    let mut axioms = RefStore::new();
    for wa in &parsed.axioms {
        axioms.push(Axiom {
            conditions: wa.conditions.iter().map(|&(v, val)| Fact::new(var_id(v), val as Value)).collect(),
            effect_var: var_id(wa.var),
            old_value: wa.old as Value,
            new_value: wa.new as Value,
        });
    }

    let mutexes: Vec<MutexGroup> = parsed
        .mutex_groups
        .iter()
        .map(|facts| MutexGroup {
            facts: facts.iter().map(|&(v, val)| Fact::new(var_id(v), val as Value)).collect(),
        })
        .collect();

    let initial_state: Vec<Value> = parsed.initial_state.iter().map(|&v| v as Value).collect();
    let goal: Vec<Fact> = parsed.goal.iter().map(|&(v, val)| Fact::new(var_id(v), val as Value)).collect();

    Task::new(variables, operators, axioms, mutexes, initial_state, goal, parsed.uses_metric)
}

fn write_facts(w: &mut impl Write, facts: &[(i64, i64)]) -> std::io::Result<()> {
    for &(v, val) in facts {
        writeln!(w, "{} {}", v, val)?;
    }
    Ok(())
}

/// Emits a preprocessed task in the §6.2 output format: the §6.1-shaped task
/// section (operators/axioms/mutex groups already reference the task's
/// level-ordered `VarId`s directly, so no remapping happens here beyond
/// `VarId -> i64`), followed by the successor generator, one DTG per
/// variable, and the causal graph.
pub fn emit(pre: &PreprocessedTask, w: &mut impl Write) -> std::io::Result<()> {
    let task = &pre.task;
    writeln!(w, "begin_version")?;
    writeln!(w, "{}", EXPECTED_VERSION)?;
    writeln!(w, "end_version")?;
    writeln!(w, "begin_metric")?;
    writeln!(w, "{}", task.uses_metric as i32)?;
    writeln!(w, "end_metric")?;

    writeln!(w, "{}", task.num_variables())?;
    for (_, v) in task.variables.entries() {
        writeln!(w, "begin_variable")?;
        writeln!(w, "{}", v.name)?;
        writeln!(w, "{}", v.axiom_layer)?;
        writeln!(w, "{}", v.domain_size)?;
        for name in &v.value_names {
            writeln!(w, "{}", name)?;
        }
        writeln!(w, "end_variable")?;
    }

    writeln!(w, "{}", task.mutexes.len())?;
    for group in &task.mutexes {
        writeln!(w, "begin_mutex_group")?;
        writeln!(w, "{}", group.facts.len())?;
        let facts: Vec<(i64, i64)> = group.facts.iter().map(|f| (i64::from(usize::from(f.var) as i64), f.value as i64)).collect();
        write_facts(w, &facts)?;
        writeln!(w, "end_mutex_group")?;
    }

    writeln!(w, "begin_state")?;
    for &value in &task.initial_state {
        writeln!(w, "{}", value)?;
    }
    writeln!(w, "end_state")?;

    writeln!(w, "begin_goal")?;
    writeln!(w, "{}", task.goal.len())?;
    let goal_facts: Vec<(i64, i64)> = task.goal.iter().map(|f| (usize::from(f.var) as i64, f.value as i64)).collect();
    write_facts(w, &goal_facts)?;
    writeln!(w, "end_goal")?;

    writeln!(w, "{}", task.operators.len())?;
    for (_, op) in task.operators.entries() {
        writeln!(w, "begin_operator")?;
        writeln!(w, "{}", op.name)?;
        writeln!(w, "{}", op.preconditions.len())?;
        let prevail: Vec<(i64, i64)> = op.preconditions.iter().map(|f| (usize::from(f.var) as i64, f.value as i64)).collect();
        write_facts(w, &prevail)?;
        writeln!(w, "{}", op.effects.len())?;
        for e in &op.effects {
            writeln!(w, "{}", e.conditions.len())?;
            let conds: Vec<(i64, i64)> = e.conditions.iter().map(|f| (usize::from(f.var) as i64, f.value as i64)).collect();
            write_facts(w, &conds)?;
            let pre = e.precondition_value.map(|v| v as i64).unwrap_or(-1);
            writeln!(w, "{} {} {}", usize::from(e.fact.var), pre, e.fact.value)?;
        }
        writeln!(w, "{}", op.cost)?;
        writeln!(w, "end_operator")?;
    }

    writeln!(w, "{}", task.axioms.len())?;
    for (_, ax) in task.axioms.entries() {
        writeln!(w, "begin_rule")?;
        writeln!(w, "{}", ax.conditions.len())?;
        let conds: Vec<(i64, i64)> = ax.conditions.iter().map(|f| (usize::from(f.var) as i64, f.value as i64)).collect();
        write_facts(w, &conds)?;
        writeln!(w, "{} {} {}", usize::from(ax.effect_var), ax.old_value, ax.new_value)?;
        writeln!(w, "end_rule")?;
    }

    writeln!(w, "begin_SG")?;
    pre.successor_generator.write(w)?;
    writeln!(w, "end_SG")?;

    for dtg in &pre.dtgs {
        writeln!(w, "begin_DTG")?;
        dtg.write(w)?;
        writeln!(w, "end_DTG")?;
    }

    writeln!(w, "begin_CG")?;
    pre.causal_graph.write(w)?;
    writeln!(w, "end_CG")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> String {
        "begin_version\n3\nend_version\n\
begin_metric\n0\nend_metric\n\
2\n\
begin_variable\nv0\n-1\n2\nfoo\nbar\nend_variable\n\
begin_variable\nv1\n-1\n2\nbaz\nqux\nend_variable\n\
0\n\
begin_state\n0\n0\nend_state\n\
begin_goal\n1\n1 1\nend_goal\n\
1\n\
begin_operator\nop0\n1\n0 0\n1\n0\n1 -1 1\n1\nend_operator\n\
0\n"
            .to_string()
    }

    #[test]
    fn parses_literal_input_and_builds_task() {
        let parsed = parse(sample_input().as_bytes()).unwrap();
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.variables.len(), 2);
        assert_eq!(parsed.variables[0].value_names, vec!["foo", "bar"]);
        let task = to_task(&parsed).unwrap();
        assert_eq!(task.num_variables(), 2);
        assert_eq!(task.operators.len(), 1);
        assert_eq!(task.goal, vec![Fact::new(VarId::from(1usize), 1)]);
    }

    #[test]
    fn rejects_version_mismatch() {
        let bad = sample_input().replacen("3\nend_version", "99\nend_version", 1);
        let err = parse(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::VersionMismatch { .. }));
    }

    #[test]
    fn rejects_missing_marker() {
        let bad = sample_input().replacen("end_version", "end_versio", 1);
        let err = parse(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn emit_then_reparse_is_a_fixed_point() {
        let parsed = parse(sample_input().as_bytes()).unwrap();
        let task = to_task(&parsed).unwrap();
        let pre = crate::preprocess(&task, true).unwrap();
        let mut buf = Vec::new();
        emit(&pre, &mut buf).unwrap();

        // parse() only ever reads through the axiom block (the §6.1-shaped
        // prefix of the §6.2 output), so reparsing the emitted bytes directly
        // rewraps that prefix and ignores the trailing SG/DTG/CG sections —
        // exactly the "re-running the preprocessor on its own output (after
        // rewrapping)" fixed point from spec.md §8.
        let reparsed = parse(buf.as_slice()).unwrap();
        let task_again = to_task(&reparsed).unwrap();
        let pre_again = crate::preprocess(&task_again, true).unwrap();

        let mut buf2 = Vec::new();
        emit(&pre_again, &mut buf2).unwrap();
        assert_eq!(buf, buf2, "re-emitting a reparsed, re-preprocessed task must reach a fixed point");
    }

    #[test]
    fn emit_writes_sg_dtg_cg_blocks() {
        let parsed = parse(sample_input().as_bytes()).unwrap();
        let task = to_task(&parsed).unwrap();
        let pre = crate::preprocess(&task, true).unwrap();
        let mut buf = Vec::new();
        emit(&pre, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("begin_SG"));
        assert!(text.contains("end_SG"));
        assert_eq!(text.matches("begin_DTG").count(), pre.task.num_variables());
        assert_eq!(text.matches("end_DTG").count(), pre.task.num_variables());
        assert!(text.contains("begin_CG"));
        assert!(text.contains("end_CG"));
        // SG/DTG/CG come after the axiom block, in that order.
        let sg_pos = text.find("begin_SG").unwrap();
        let last_dtg_pos = text.rfind("begin_DTG").unwrap();
        let cg_pos = text.find("begin_CG").unwrap();
        assert!(sg_pos < last_dtg_pos);
        assert!(last_dtg_pos < cg_pos);
    }
}
