//! Named sections built from byte spans, and the emit primitives.
//!
//! A span is a contiguous run of assembled bytes with a logical address
//! (`org`, what the code was assembled for) and a physical one (`put`,
//! where it lands in the output image). Emission appends to the current
//! span while the program counter still lines up with its end; any PC
//! discontinuity (ORG, RMB, PUT, section switch) makes the next emit open
//! a fresh span with a new sequence number. Sequence numbers order spans
//! globally so overlapping output placements resolve to the latest write.

use crate::labels::LocalLabels;
use byteorder::ByteOrder;
use std::collections::HashMap;
use util::Endian;

#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub sequence: u32,
    pub org: u16,
    pub put: u16,
    pub data: Vec<u8>,
}

impl Span {
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn put_end(&self) -> u16 {
        self.put.wrapping_add(self.data.len() as u16)
    }
}

#[derive(Debug)]
pub struct Section {
    pub name: String,
    pub spans: Vec<Span>,
    pub locals: LocalLabels,
    pub pc: u16,
    /// Direct page in effect, or -1 when no direct page is valid.
    pub dp: i32,
    pass: u32,
    last_pc: u16,
    /// `put - org` for spans allocated from here on.
    put_delta: i32,
    force_new_span: bool,
}

impl Section {
    fn new(name: &str, pass: u32, pc: u16) -> Section {
        Section {
            name: name.to_owned(),
            spans: Vec::new(),
            locals: LocalLabels::new(),
            pc,
            dp: -1,
            pass,
            last_pc: pc,
            put_delta: 0,
            force_new_span: false,
        }
    }

    /// Clean per-pass state. Spans and PC state are rebuilt from scratch;
    /// local labels persist so forward references resolve from the
    /// previous pass's entries.
    fn reset(&mut self, pass: u32, pc: u16) {
        self.spans.clear();
        self.pc = pc;
        self.dp = -1;
        self.pass = pass;
        self.last_pc = pc;
        self.put_delta = 0;
        self.force_new_span = false;
    }

    /// Merges abutting spans in place; `sort` orders by physical address
    /// first, `pad` zero-fills gaps between consecutive spans.
    pub fn coalesce(&mut self, sort: bool, pad: bool) {
        if sort {
            self.spans.sort_by_key(|s| (s.put, s.sequence));
        }
        let mut merged: Vec<Span> = Vec::new();
        for span in self.spans.drain(..) {
            match merged.last_mut() {
                Some(last) if span.put == last.put_end() => {
                    last.data.extend_from_slice(&span.data);
                }
                Some(last)
                    if pad
                        && span.put > last.put_end()
                        && last.put_end() >= last.put =>
                {
                    let gap = (span.put - last.put_end()) as usize;
                    last.data.resize(last.data.len() + gap, 0);
                    last.data.extend_from_slice(&span.data);
                }
                _ => merged.push(span),
            }
        }
        self.spans = merged;
    }
}

/// All sections of an assembly, the currently selected one, and the
/// global span sequence counter.
#[derive(Debug)]
pub struct Sections {
    sections: HashMap<String, Section>,
    current: String,
    sequence: u32,
}

pub const DEFAULT_SECTION: &str = "";

impl Sections {
    pub fn new() -> Sections {
        let mut sections = HashMap::new();
        sections.insert(
            DEFAULT_SECTION.to_owned(),
            Section::new(DEFAULT_SECTION, 0, 0),
        );
        Sections {
            sections,
            current: DEFAULT_SECTION.to_owned(),
            sequence: 0,
        }
    }

    /// Starts a pass in the default section at PC 0.
    pub fn begin_pass(&mut self, pass: u32) {
        self.current = DEFAULT_SECTION.to_owned();
        self.sections
            .get_mut(DEFAULT_SECTION)
            .unwrap()
            .reset(pass, 0);
    }

    /// Selects (creating or pass-resetting as needed) the named section.
    /// A section entered for the first time on a pass starts at the PC
    /// the previous section left off at.
    pub fn set(&mut self, name: &str, pass: u32) {
        let inherited = {
            let cur = self.current_mut();
            cur.last_pc = cur.pc;
            cur.last_pc
        };
        match self.sections.get_mut(name) {
            Some(section) => {
                if section.pass != pass {
                    section.reset(pass, inherited);
                }
            }
            None => {
                self.sections
                    .insert(name.to_owned(), Section::new(name, pass, inherited));
            }
        }
        self.current = name.to_owned();
    }

    pub fn current(&self) -> &Section {
        &self.sections[&self.current]
    }

    pub fn current_mut(&mut self) -> &mut Section {
        self.sections.get_mut(&self.current).unwrap()
    }

    pub fn pc(&self) -> u16 {
        self.current().pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.current_mut().pc = pc;
    }

    /// Advances PC without emitting (RMB).
    pub fn reserve(&mut self, count: u16) {
        let cur = self.current_mut();
        cur.pc = cur.pc.wrapping_add(count);
    }

    pub fn dp(&self) -> i32 {
        self.current().dp
    }

    pub fn set_dp(&mut self, dp: i32) {
        self.current_mut().dp = dp;
    }

    /// Redirects the physical placement of everything emitted from here
    /// on: the next span opens with `put` = `address` while `org`
    /// continues from the current PC.
    pub fn set_put(&mut self, address: u16) {
        let cur = self.current_mut();
        cur.put_delta = (address as i32) - (cur.pc as i32);
        cur.force_new_span = true;
    }

    fn ensure_span(&mut self) {
        let sequence = self.sequence;
        let cur = self.sections.get_mut(&self.current).unwrap();
        let appendable = !cur.force_new_span
            && cur
                .spans
                .last()
                .map_or(false, |s| s.org.wrapping_add(s.data.len() as u16) == cur.pc);
        if !appendable {
            let put = ((cur.pc as i32).wrapping_add(cur.put_delta) & 0xFFFF) as u16;
            cur.spans.push(Span {
                sequence,
                org: cur.pc,
                put,
                data: Vec::new(),
            });
            cur.force_new_span = false;
            self.sequence += 1;
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.ensure_span();
        let cur = self.sections.get_mut(&self.current).unwrap();
        cur.spans.last_mut().unwrap().data.extend_from_slice(bytes);
        cur.pc = cur.pc.wrapping_add(bytes.len() as u16);
    }

    /// `count` reserved bytes that take space in the image with content
    /// zero.
    pub fn emit_pad(&mut self, count: u32) {
        self.ensure_span();
        let cur = self.sections.get_mut(&self.current).unwrap();
        let span = cur.spans.last_mut().unwrap();
        span.data.resize(span.data.len() + count as usize, 0);
        cur.pc = cur.pc.wrapping_add(count as u16);
    }

    pub fn emit_imm8(&mut self, value: u8) {
        self.push_bytes(&[value]);
    }

    pub fn emit_imm16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        Endian::write_u16(&mut buf, value);
        self.push_bytes(&buf);
    }

    /// Opcode byte, or prefix + opcode for page-2/page-3 values.
    pub fn emit_op(&mut self, op: u16) {
        if op > 0xFF {
            self.push_bytes(&[(op >> 8) as u8, op as u8]);
        } else {
            self.push_bytes(&[op as u8]);
        }
    }

    /// 8-bit displacement to `target`, relative to the address following
    /// the operand. Returns the full displacement so the caller can
    /// range-check it.
    pub fn emit_rel8(&mut self, target: u16) -> i16 {
        let displacement = target.wrapping_sub(self.pc().wrapping_add(1));
        self.push_bytes(&[displacement as u8]);
        displacement as i16
    }

    /// 16-bit displacement to `target`, relative to the address following
    /// the operand.
    pub fn emit_rel16(&mut self, target: u16) {
        let displacement = target.wrapping_sub(self.pc().wrapping_add(2));
        self.emit_imm16(displacement);
    }

    /// Total bytes emitted so far into the current section; paired with
    /// [`Sections::bytes_since`] to recover what one line emitted.
    pub fn mark(&self) -> usize {
        self.current().spans.iter().map(|s| s.data.len()).sum()
    }

    pub fn bytes_since(&self, mark: usize) -> Vec<u8> {
        let mut skip = mark;
        let mut out = Vec::new();
        for span in &self.current().spans {
            if skip >= span.data.len() {
                skip -= span.data.len();
            } else {
                out.extend_from_slice(&span.data[skip..]);
                skip = 0;
            }
        }
        out
    }

    /// Local-label values of every section, in a deterministic order, for
    /// the pass-convergence snapshot.
    pub fn locals_snapshot(&self) -> Vec<(String, i64, u32, std::rc::Rc<crate::node::Node>)> {
        let mut names: Vec<&String> = self.sections.keys().collect();
        names.sort();
        let mut out = Vec::new();
        for name in names {
            for (label, line, value) in self.sections[name].locals.snapshot() {
                out.push((name.clone(), label, line, value));
            }
        }
        out
    }

    /// Merges every span of every section into one unnamed section sorted
    /// by physical address. Where placements overlap, the span with the
    /// higher sequence number — the later write — wins byte by byte.
    /// `pad` zero-fills gaps so a single contiguous span results.
    pub fn coalesce_all(&self, pad: bool) -> Section {
        let mut spans: Vec<&Span> = self
            .sections
            .values()
            .flat_map(|s| s.spans.iter())
            .filter(|s| !s.data.is_empty())
            .collect();
        spans.sort_by_key(|s| s.sequence);

        let mut memory: Vec<Option<u8>> = vec![None; 0x10000];
        for span in spans {
            for (i, byte) in span.data.iter().enumerate() {
                memory[(span.put as usize + i) & 0xFFFF] = Some(*byte);
            }
        }

        let mut out = Section::new(DEFAULT_SECTION, 0, 0);
        let mut run: Option<Span> = None;
        for (address, cell) in memory.iter().enumerate() {
            match (cell, run.as_mut()) {
                (Some(byte), Some(span)) if pad || span.put_end() as usize == address => {
                    let gap = address - span.put_end() as usize;
                    span.data.resize(span.data.len() + gap, 0);
                    span.data.push(*byte);
                }
                (Some(byte), _) => {
                    if let Some(finished) = run.take() {
                        out.spans.push(finished);
                    }
                    run = Some(Span {
                        sequence: out.spans.len() as u32,
                        org: address as u16,
                        put: address as u16,
                        data: vec![*byte],
                    });
                }
                (None, _) => {}
            }
        }
        if let Some(finished) = run.take() {
            out.spans.push(finished);
        }
        let mut seq = 0;
        for span in &mut out.spans {
            span.sequence = seq;
            seq += 1;
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> Sections {
        let mut sections = Sections::new();
        sections.begin_pass(1);
        sections
    }

    #[test]
    fn emission_extends_the_current_span() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(0x12);
        s.emit_imm16(0x3456);
        let cur = s.current();
        assert_eq!(cur.spans.len(), 1);
        assert_eq!(cur.spans[0].org, 0x1000);
        assert_eq!(cur.spans[0].data, vec![0x12, 0x34, 0x56]);
        assert_eq!(cur.pc, 0x1003);
    }

    #[test]
    fn pc_discontinuity_opens_a_new_span() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(0x01);
        s.set_pc(0x2000);
        s.emit_imm8(0x02);
        let cur = s.current();
        assert_eq!(cur.spans.len(), 2);
        assert_eq!(cur.spans[1].org, 0x2000);
        assert!(cur.spans[1].sequence > cur.spans[0].sequence);
    }

    #[test]
    fn reserve_advances_pc_without_bytes() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(0x01);
        s.reserve(4);
        s.emit_imm8(0x02);
        let cur = s.current();
        assert_eq!(cur.spans.len(), 2);
        assert_eq!(cur.spans[1].org, 0x1005);
    }

    #[test]
    fn put_diverges_physical_from_logical() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.set_put(0x4000);
        s.emit_imm8(0xAA);
        let span = &s.current().spans[0];
        assert_eq!(span.org, 0x1000);
        assert_eq!(span.put, 0x4000);
    }

    #[test]
    fn rel8_is_relative_to_the_following_byte() {
        let mut s = fresh();
        s.set_pc(0x1002);
        let displacement = s.emit_rel8(0x1000);
        assert_eq!(displacement, -3);
        assert_eq!(s.current().spans[0].data, vec![0xFD]);
    }

    #[test]
    fn later_spans_overwrite_earlier_placements() {
        let mut s = fresh();
        s.set_pc(0x1000);
        for b in &[1u8, 2, 3, 4] {
            s.emit_imm8(*b);
        }
        s.set_pc(0x1001);
        s.emit_imm8(9);
        let merged = s.coalesce_all(true);
        assert_eq!(merged.spans.len(), 1);
        assert_eq!(merged.spans[0].put, 0x1000);
        assert_eq!(merged.spans[0].data, vec![1, 9, 3, 4]);
    }

    #[test]
    fn coalesce_all_pads_gaps_when_asked() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(0x11);
        s.set_pc(0x1004);
        s.emit_imm8(0x44);
        let padded = s.coalesce_all(true);
        assert_eq!(padded.spans.len(), 1);
        assert_eq!(padded.spans[0].data, vec![0x11, 0, 0, 0, 0x44]);

        let sparse = s.coalesce_all(false);
        assert_eq!(sparse.spans.len(), 2);
    }

    #[test]
    fn coalesce_merges_and_pads_in_span_order() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(0xAA);
        s.set_pc(0x1004);
        s.emit_imm8(0xBB);
        s.set_pc(0x1001);
        s.emit_imm8(0xCC);
        s.current_mut().coalesce(true, true);
        let spans = &s.current().spans;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].put, 0x1000);
        assert_eq!(spans[0].data, vec![0xAA, 0xCC, 0, 0, 0xBB]);
    }

    #[test]
    fn sections_keep_independent_pcs() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(1);
        s.set("data", 1);
        s.set_pc(0x8000);
        s.emit_imm8(2);
        s.set(DEFAULT_SECTION, 1);
        assert_eq!(s.pc(), 0x1001);
    }

    #[test]
    fn pass_reset_clears_spans_but_keeps_locals() {
        let mut s = fresh();
        s.set_pc(0x1000);
        s.emit_imm8(1);
        s.current_mut()
            .locals
            .set(1, 10, crate::node::Node::int(0x1000));
        s.begin_pass(2);
        assert!(s.current().spans.is_empty());
        assert_eq!(s.current().locals.back(1, 20).int_value(), Some(0x1000));
    }
}
