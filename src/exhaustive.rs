//! Pattern-matrix usefulness and exhaustiveness (spec §4.5), after Maranget's
//! algorithm for compiling pattern matching to decision trees: a pattern is
//! useful against a set of rows if some value is matched by it and by none
//! of the preceding rows; a match is exhaustive iff a hypothetical wildcard
//! row is not useful against the full row set.

use crate::core_ast::Pattern;
use crate::tokens::Span;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ctor {
    Variant(String),
    Tuple(usize),
    Record(Vec<String>),
    Bool(bool),
    Unit,
    Lit(String),
}

#[derive(Debug, Clone)]
pub enum ExampleVal {
    Wildcard,
    Variant(String, Vec<ExampleVal>),
    Bool(bool),
    Unit,
    Tuple(Vec<ExampleVal>),
    Record(Vec<(String, ExampleVal)>),
    Lit(String),
}

impl fmt::Display for ExampleVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExampleVal::Wildcard => write!(f, "_"),
            ExampleVal::Bool(b) => write!(f, "{b}"),
            ExampleVal::Unit => write!(f, "()"),
            ExampleVal::Lit(v) => write!(f, "{v}"),
            ExampleVal::Variant(name, args) => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            ExampleVal::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            ExampleVal::Record(fields) => {
                write!(f, "{{")?;
                for (i, (n, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{n}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Type-level facts the checker accumulates while registering `type`
/// declarations, needed to decide when a set of constructors is complete.
#[derive(Debug, Clone, Default)]
pub struct ExhaustivenessCtx {
    pub ctor_to_type: HashMap<String, String>,
    pub variants_by_type: HashMap<String, Vec<(String, usize)>>,
    pub ctor_arities: HashMap<String, usize>,
}

pub struct MatchReport {
    pub unreachable_rows: Vec<usize>,
    pub witness: Option<ExampleVal>,
}

/// `guarded` marks rows with a `when` guard; guards are excluded both from
/// the matrix used for the top-level exhaustiveness probe (a guard might
/// fail at runtime, so a guarded row cannot be trusted to cover its pattern)
/// and from the preceding-row set each row's reachability is probed against
/// (an earlier guarded row, possibly false at runtime, cannot be trusted to
/// shadow a later row either) — spec §4.5.4.
pub fn check_match(rows: &[Pattern], guarded: &[bool], ctx: &ExhaustivenessCtx) -> MatchReport {
    let full: Vec<Vec<Pattern>> = rows.iter().map(|p| vec![p.clone()]).collect();

    let mut unreachable_rows = Vec::new();
    for i in 0..full.len() {
        let probe = full[i].clone();
        let preceding: Vec<Vec<Pattern>> = full[..i]
            .iter()
            .zip(guarded[..i].iter())
            .filter(|(_, g)| !**g)
            .map(|(r, _)| r.clone())
            .collect();
        if !is_useful(&preceding, &probe, ctx) {
            unreachable_rows.push(i);
        }
    }

    let exhaustive_rows: Vec<Vec<Pattern>> = full
        .iter()
        .zip(guarded.iter())
        .filter(|(_, g)| !**g)
        .map(|(r, _)| r.clone())
        .collect();
    let wildcard_probe = vec![Pattern::Wildcard(Span::dummy())];
    let witness = useful_witness(&exhaustive_rows, &wildcard_probe, ctx).map(|mut w| {
        w.remove(0)
    });

    MatchReport {
        unreachable_rows,
        witness,
    }
}

fn canonical_record_fields(rows: &[Vec<Pattern>]) -> Vec<String> {
    let mut fields = Vec::new();
    for row in rows {
        if let Some(Pattern::Record(f, _)) = row.first() {
            for (n, _) in f {
                if !fields.contains(n) {
                    fields.push(n.clone());
                }
            }
        }
    }
    fields
}

fn ctor_of_pattern(p: &Pattern, record_fields: &[String]) -> Option<(Ctor, Vec<Pattern>)> {
    match p {
        Pattern::Wildcard(_) | Pattern::Var(_, _) => None,
        Pattern::Int(v, _) => Some((Ctor::Lit(format!("i:{v}")), vec![])),
        Pattern::Float(v, _) => Some((Ctor::Lit(format!("f:{v}")), vec![])),
        Pattern::Str(v, _) => Some((Ctor::Lit(format!("s:{v}")), vec![])),
        Pattern::Bool(b, _) => Some((Ctor::Bool(*b), vec![])),
        Pattern::Unit(_) => Some((Ctor::Unit, vec![])),
        Pattern::Ctor(name, args, _) => Some((Ctor::Variant(name.clone()), args.clone())),
        Pattern::Record(fields, s) => {
            let map: HashMap<&str, &Pattern> = fields.iter().map(|(n, p)| (n.as_str(), p)).collect();
            let pats = record_fields
                .iter()
                .map(|f| map.get(f.as_str()).copied().cloned().unwrap_or(Pattern::Wildcard(*s)))
                .collect();
            Some((Ctor::Record(record_fields.to_vec()), pats))
        }
        Pattern::Tuple(elems, _) => Some((Ctor::Tuple(elems.len()), elems.clone())),
    }
}

fn specialize(rows: &[Vec<Pattern>], ctor: &Ctor, arity: usize, record_fields: &[String]) -> Vec<Vec<Pattern>> {
    let mut out = Vec::new();
    for row in rows {
        match ctor_of_pattern(&row[0], record_fields) {
            Some((c, args)) if &c == ctor => {
                let mut new_row = args;
                new_row.extend_from_slice(&row[1..]);
                out.push(new_row);
            }
            Some(_) => {}
            None => {
                let mut new_row = vec![Pattern::Wildcard(Span::dummy()); arity];
                new_row.extend_from_slice(&row[1..]);
                out.push(new_row);
            }
        }
    }
    out
}

fn default_matrix(rows: &[Vec<Pattern>]) -> Vec<Vec<Pattern>> {
    rows.iter()
        .filter(|row| ctor_of_pattern(&row[0], &[]).is_none())
        .map(|row| row[1..].to_vec())
        .collect()
}

fn collect_ctors(rows: &[Vec<Pattern>], record_fields: &[String]) -> Vec<Ctor> {
    let mut out = Vec::new();
    for row in rows {
        if let Some((c, _)) = ctor_of_pattern(&row[0], record_fields) {
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

fn complete_set(seen: &[Ctor], ctx: &ExhaustivenessCtx) -> Option<Vec<Ctor>> {
    let first = seen.first()?;
    match first {
        Ctor::Bool(_) => Some(vec![Ctor::Bool(true), Ctor::Bool(false)]),
        Ctor::Unit => Some(vec![Ctor::Unit]),
        Ctor::Tuple(n) => Some(vec![Ctor::Tuple(*n)]),
        Ctor::Record(fields) => Some(vec![Ctor::Record(fields.clone())]),
        Ctor::Lit(_) => None,
        Ctor::Variant(name) => {
            let type_name = ctx.ctor_to_type.get(name)?;
            let all = ctx.variants_by_type.get(type_name)?;
            let all_present = all.iter().all(|(n, _)| seen.contains(&Ctor::Variant(n.clone())));
            if all_present {
                Some(all.iter().map(|(n, _)| Ctor::Variant(n.clone())).collect())
            } else {
                None
            }
        }
    }
}

fn ctor_arity(c: &Ctor, ctx: &ExhaustivenessCtx) -> usize {
    match c {
        Ctor::Variant(name) => ctx.ctor_arities.get(name).copied().unwrap_or(0),
        Ctor::Tuple(n) => *n,
        Ctor::Record(fields) => fields.len(),
        Ctor::Bool(_) | Ctor::Unit | Ctor::Lit(_) => 0,
    }
}

fn ctor_to_example(c: &Ctor, args: Vec<ExampleVal>) -> ExampleVal {
    match c {
        Ctor::Variant(name) => ExampleVal::Variant(name.clone(), args),
        Ctor::Tuple(_) => ExampleVal::Tuple(args),
        Ctor::Record(fields) => ExampleVal::Record(fields.iter().cloned().zip(args).collect()),
        Ctor::Bool(b) => ExampleVal::Bool(*b),
        Ctor::Unit => ExampleVal::Unit,
        Ctor::Lit(v) => ExampleVal::Lit(v.clone()),
    }
}

fn is_useful(rows: &[Vec<Pattern>], v: &[Pattern], ctx: &ExhaustivenessCtx) -> bool {
    if v.is_empty() {
        return rows.is_empty();
    }
    let mut combined = rows.to_vec();
    combined.push(v.to_vec());
    let record_fields = canonical_record_fields(&combined);

    match ctor_of_pattern(&v[0], &record_fields) {
        Some((ctor, args)) => {
            let arity = args.len();
            let spec_rows = specialize(rows, &ctor, arity, &record_fields);
            let mut new_v = args;
            new_v.extend_from_slice(&v[1..]);
            is_useful(&spec_rows, &new_v, ctx)
        }
        None => {
            let seen = collect_ctors(rows, &record_fields);
            if let Some(full_set) = complete_set(&seen, ctx) {
                full_set.iter().any(|c| {
                    let arity = ctor_arity(c, ctx);
                    let spec_rows = specialize(rows, c, arity, &record_fields);
                    let mut new_v = vec![Pattern::Wildcard(Span::dummy()); arity];
                    new_v.extend_from_slice(&v[1..]);
                    is_useful(&spec_rows, &new_v, ctx)
                })
            } else {
                is_useful(&default_matrix(rows), &v[1..], ctx)
            }
        }
    }
}

fn useful_witness(rows: &[Vec<Pattern>], v: &[Pattern], ctx: &ExhaustivenessCtx) -> Option<Vec<ExampleVal>> {
    if v.is_empty() {
        return if rows.is_empty() { Some(vec![]) } else { None };
    }
    let mut combined = rows.to_vec();
    combined.push(v.to_vec());
    let record_fields = canonical_record_fields(&combined);

    match ctor_of_pattern(&v[0], &record_fields) {
        Some((ctor, args)) => {
            let arity = args.len();
            let spec_rows = specialize(rows, &ctor, arity, &record_fields);
            let mut new_v = args;
            new_v.extend_from_slice(&v[1..]);
            let sub = useful_witness(&spec_rows, &new_v, ctx)?;
            let (head_args, tail) = sub.split_at(arity);
            let mut result = vec![ctor_to_example(&ctor, head_args.to_vec())];
            result.extend_from_slice(tail);
            Some(result)
        }
        None => {
            let seen = collect_ctors(rows, &record_fields);
            if let Some(full_set) = complete_set(&seen, ctx) {
                for c in &full_set {
                    let arity = ctor_arity(c, ctx);
                    let spec_rows = specialize(rows, c, arity, &record_fields);
                    let mut new_v = vec![Pattern::Wildcard(Span::dummy()); arity];
                    new_v.extend_from_slice(&v[1..]);
                    if let Some(sub) = useful_witness(&spec_rows, &new_v, ctx) {
                        let (head_args, tail) = sub.split_at(arity);
                        let mut result = vec![ctor_to_example(c, head_args.to_vec())];
                        result.extend_from_slice(tail);
                        return Some(result);
                    }
                }
                None
            } else {
                let sub = useful_witness(&default_matrix(rows), &v[1..], ctx)?;
                let mut result = vec![ExampleVal::Wildcard];
                result.extend(sub);
                Some(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option_ctx() -> ExhaustivenessCtx {
        let mut ctx = ExhaustivenessCtx::default();
        ctx.ctor_to_type.insert("Some".to_string(), "Option".to_string());
        ctx.ctor_to_type.insert("None".to_string(), "Option".to_string());
        ctx.variants_by_type.insert(
            "Option".to_string(),
            vec![("Some".to_string(), 1), ("None".to_string(), 0)],
        );
        ctx.ctor_arities.insert("Some".to_string(), 1);
        ctx.ctor_arities.insert("None".to_string(), 0);
        ctx
    }

    fn list_ctx() -> ExhaustivenessCtx {
        let mut ctx = ExhaustivenessCtx::default();
        ctx.ctor_to_type.insert("Cons".to_string(), "List".to_string());
        ctx.ctor_to_type.insert("Nil".to_string(), "List".to_string());
        ctx.variants_by_type.insert(
            "List".to_string(),
            vec![("Cons".to_string(), 2), ("Nil".to_string(), 0)],
        );
        ctx.ctor_arities.insert("Cons".to_string(), 2);
        ctx.ctor_arities.insert("Nil".to_string(), 0);
        ctx
    }

    #[test]
    fn option_some_only_is_not_exhaustive_with_none_witness() {
        let s = Span::dummy();
        let rows = vec![Pattern::Ctor("Some".to_string(), vec![Pattern::Var("n".to_string(), s)], s)];
        let report = check_match(&rows, &[false], &option_ctx());
        assert!(report.witness.is_some());
        assert_eq!(report.witness.unwrap().to_string(), "None");
    }

    #[test]
    fn list_cons_nil_with_wildcard_is_exhaustive() {
        let s = Span::dummy();
        let rows = vec![
            Pattern::Ctor("Nil".to_string(), vec![], s),
            Pattern::Ctor(
                "Cons".to_string(),
                vec![Pattern::Wildcard(s), Pattern::Wildcard(s)],
                s,
            ),
        ];
        let report = check_match(&rows, &[false, false], &list_ctx());
        assert!(report.witness.is_none());
        assert!(report.unreachable_rows.is_empty());
    }

    #[test]
    fn or_pattern_expanded_int_cases_with_wildcard_is_exhaustive_and_reachable() {
        let s = Span::dummy();
        let rows = vec![
            Pattern::Int("0".to_string(), s),
            Pattern::Int("1".to_string(), s),
            Pattern::Wildcard(s),
        ];
        let report = check_match(&rows, &[false, false, false], &ExhaustivenessCtx::default());
        assert!(report.witness.is_none());
        assert!(report.unreachable_rows.is_empty());
    }

    #[test]
    fn redundant_wildcard_after_wildcard_is_unreachable() {
        let s = Span::dummy();
        let rows = vec![Pattern::Wildcard(s), Pattern::Int("0".to_string(), s)];
        let report = check_match(&rows, &[false, false], &ExhaustivenessCtx::default());
        assert_eq!(report.unreachable_rows, vec![1]);
    }

    #[test]
    fn bool_both_arms_exhaustive() {
        let s = Span::dummy();
        let rows = vec![Pattern::Bool(true, s), Pattern::Bool(false, s)];
        let report = check_match(&rows, &[false, false], &ExhaustivenessCtx::default());
        assert!(report.witness.is_none());
    }
}
