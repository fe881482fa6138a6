//! The instruction map: C1.
//!
//! Holds every emitted instruction, fixes up jump/call/try targets once the
//! whole method has been walked, and serialises the final byte sequence.
//! Instructions are addressed by an arena handle (`Inst`, in the style of
//! `cranelift_entity`'s `entity_impl!`) rather than by a raw index or
//! pointer into a `Vec`, so a target recorded before its destination exists
//! survives reordering — see §9 "Cyclic target references".
//!
//! Storage (`insts`) and layout (`order`) are kept separate: `insts` never
//! reorders once an instruction is inserted, while `order` is the sequence
//! instructions actually serialise in. [`InstructionMap::relocate_to_end`]
//! permutes `order` alone, the way the source's `move_to_end` relocates a
//! block of already-emitted code without touching its contents.

use cranelift_entity::{entity_impl, PrimaryMap};
use log::debug;
use smallvec::SmallVec;

use crate::opcode::OpCode;

/// A handle to one emitted instruction. Stable across relaxation and
/// relocation — only the instruction's *address* changes, never its
/// identity.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

#[derive(Debug, Clone)]
enum Operand {
    None,
    /// Literal operand bytes, already encoded (e.g. a `PUSHDATA1` length
    /// prefix plus payload, or a `PUSHINT32` little-endian immediate).
    /// Fixed size once emitted — never touched by relaxation.
    Bytes(SmallVec<[u8; 8]>),
    /// A relative branch/call/try operand whose byte width depends on
    /// whichever of the opcode's short/long forms is currently in force,
    /// and whose value depends on the final address of both instructions.
    /// Resolved by [`InstructionMap::finalise`].
    Target(Inst),
}

#[derive(Debug, Clone)]
enum Slot {
    Real { opcode: OpCode, operand: Operand },
    /// A zero-size marker used purely so a branch can reference "the point
    /// right after this construct" before anything real occupies it — e.g.
    /// the fall-through target of an `if` with no `else`. Contributes no
    /// bytes to the serialised script; after `finalise` its address equals
    /// whatever the next real instruction's address is (or the script's
    /// total size, if nothing follows).
    Marker,
}

#[derive(Debug, Clone)]
struct Instruction {
    slot: Slot,
    /// Byte offset from the start of the script. Valid only after
    /// `finalise` has run; `0` beforehand.
    address: u32,
}

/// The growing, then fixed, sequence of Neo VM instructions for one
/// translation unit.
#[derive(Debug, Default)]
pub struct InstructionMap {
    insts: PrimaryMap<Inst, Instruction>,
    order: Vec<Inst>,
    finalised: bool,
}

impl InstructionMap {
    pub fn new() -> Self {
        InstructionMap::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The position the next inserted instruction will occupy in emission
    /// order — used by callers that need to recover "the first instruction
    /// I'm about to emit" as an [`Inst`] handle before emitting it.
    pub fn next_index(&self) -> usize {
        self.order.len()
    }

    /// The instruction occupying emission position `index`, if any.
    pub fn inst_at(&self, index: usize) -> Option<Inst> {
        self.order.get(index).copied()
    }

    /// Appends an opcode with no operand (e.g. `ADD`, `RET`, `NOP`).
    pub fn insert(&mut self, opcode: OpCode) -> Inst {
        self.insert_raw(Slot::Real {
            opcode,
            operand: Operand::None,
        })
    }

    /// Appends an opcode with literal operand bytes (e.g. `PUSHINT8 0x2A`,
    /// `PUSHDATA1 <len><bytes>`). `opcode` must not be one of the
    /// target-carrying family — use [`Self::insert_branch`] for those.
    pub fn insert_with_bytes(&mut self, opcode: OpCode, bytes: &[u8]) -> Inst {
        debug_assert!(!opcode.has_target(), "{opcode} takes a target, not bytes");
        self.insert_raw(Slot::Real {
            opcode,
            operand: Operand::Bytes(bytes.iter().copied().collect()),
        })
    }

    /// Appends a branch/call/try instruction whose operand is a relative
    /// offset to `target`, computed once layout is final. `opcode` should
    /// be the *short* form; [`Self::finalise`] upgrades it to the long
    /// form automatically if the final offset doesn't fit in one byte.
    pub fn insert_branch(&mut self, opcode: OpCode, target: Inst) -> Inst {
        debug_assert!(opcode.has_target(), "{opcode} does not take a target");
        self.insert_raw(Slot::Real {
            opcode,
            operand: Operand::Target(target),
        })
    }

    /// Reserves a slot for a branch instruction to be filled in later via
    /// [`Self::patch_branch`] — used when a forward jump's target
    /// instruction hasn't been emitted yet (e.g. the end of an `if`'s
    /// `then` branch). Holds `NOP` until patched, so an unpatched
    /// reservation is at least detectable rather than silently wrong.
    pub fn reserve(&mut self) -> Inst {
        self.insert_raw(Slot::Real {
            opcode: OpCode::Nop,
            operand: Operand::None,
        })
    }

    /// Appends a zero-size marker instruction, used purely as a jump
    /// target for "the point right after this construct" — it contributes
    /// no bytes to the serialised script.
    pub fn insert_marker(&mut self) -> Inst {
        self.insert_raw(Slot::Marker)
    }

    /// Overwrites a previously reserved instruction in place. The handle
    /// stays valid and its position in `order` is unchanged.
    pub fn patch_branch(&mut self, inst: Inst, opcode: OpCode, target: Inst) {
        debug_assert!(opcode.has_target());
        self.insts[inst] = Instruction {
            slot: Slot::Real {
                opcode,
                operand: Operand::Target(target),
            },
            address: 0,
        };
        self.finalised = false;
    }

    fn insert_raw(&mut self, slot: Slot) -> Inst {
        let inst = self.insts.push(Instruction { slot, address: 0 });
        self.order.push(inst);
        self.finalised = false;
        inst
    }

    /// Moves the contiguous range `[first, last]` (by current position in
    /// `order`, inclusive) to the end of the sequence, preserving their
    /// relative order. Used to relocate a block of already-emitted code —
    /// for example, static-variable initialisers generated ahead of the
    /// method whose entry point must occupy offset zero.
    pub fn relocate_to_end(&mut self, first: Inst, last: Inst) {
        let first_pos = self
            .order
            .iter()
            .position(|&i| i == first)
            .expect("first instruction must already be in the map");
        let last_pos = self
            .order
            .iter()
            .position(|&i| i == last)
            .expect("last instruction must already be in the map");
        assert!(first_pos <= last_pos, "relocated range must be non-empty and ordered");
        let block: Vec<Inst> = self.order.drain(first_pos..=last_pos).collect();
        self.order.extend(block);
        self.finalised = false;
    }

    /// Moves every instruction preceding `inst` to the end of the sequence,
    /// so `inst` becomes the first instruction in emission order. A no-op if
    /// `inst` is already first. Built on [`Self::relocate_to_end`] the same
    /// way a forced entry-point relocation reuses the general block-move
    /// primitive rather than a bespoke reorder.
    pub fn relocate_to_head(&mut self, inst: Inst) {
        let pos = self
            .order
            .iter()
            .position(|&i| i == inst)
            .expect("inst must already be in the map");
        if pos == 0 {
            return;
        }
        let first = self.order[0];
        let last_before = self.order[pos - 1];
        self.relocate_to_end(first, last_before);
    }

    fn static_size(&self, inst: Inst) -> u32 {
        match &self.insts[inst].slot {
            Slot::Marker => 0,
            Slot::Real { opcode, operand } => {
                let operand_len = match operand {
                    Operand::None => 0,
                    Operand::Bytes(b) => b.len(),
                    Operand::Target(_) => opcode.max_operand_len(),
                };
                1 + operand_len as u32
            }
        }
    }

    fn update_addresses(&mut self) {
        let mut address = 0u32;
        for &inst in &self.order {
            self.insts[inst].address = address;
            address += self.static_size(inst);
        }
    }

    /// One relaxation round: upgrades any short-form branch whose target
    /// no longer fits a signed byte offset. Returns whether anything
    /// changed, so [`Self::finalise`] can iterate to a fixed point —
    /// upgrading one branch can push another out of range, exactly as in
    /// the teacher's `relax_branches`.
    fn relax_one_round(&mut self) -> bool {
        let mut changed = false;
        for &inst in &self.order {
            let instruction = &self.insts[inst];
            let Slot::Real { opcode, operand } = &instruction.slot else {
                continue;
            };
            let Operand::Target(target) = *operand else {
                continue;
            };
            let Some(larger) = opcode.larger_form() else {
                continue;
            };
            let address = instruction.address;
            let delta = self.insts[target].address as i64 - address as i64;
            if delta < i8::MIN as i64 || delta > i8::MAX as i64 {
                let original = *opcode;
                debug!(
                    "relaxing {} -> {} at address {} (delta {delta} out of i8 range)",
                    original, larger, address
                );
                let Slot::Real { opcode, .. } = &mut self.insts[inst].slot else {
                    unreachable!()
                };
                *opcode = larger;
                changed = true;
            }
        }
        changed
    }

    /// Computes final addresses, upgrades short-form branches to their
    /// long form until no more upgrades are needed, then resolves every
    /// target operand to its final relative offset. Idempotent: calling
    /// `finalise` twice in a row on an unchanged map is a no-op.
    pub fn finalise(&mut self) {
        self.update_addresses();
        loop {
            let changed = self.relax_one_round();
            self.update_addresses();
            if !changed {
                break;
            }
        }
        self.finalised = true;
    }

    /// The total size in bytes of the finalised script.
    pub fn bytecode_size(&self) -> u32 {
        self.order
            .last()
            .map(|&last| self.insts[last].address + self.static_size(last))
            .unwrap_or(0)
    }

    /// The byte offset `inst` occupies in the finalised script. Panics if
    /// `finalise` hasn't been called since the last mutation.
    pub fn address_of(&self, inst: Inst) -> u32 {
        assert!(self.finalised, "address_of called before finalise");
        self.insts[inst].address
    }

    /// Serialises the finalised instruction sequence to its final byte
    /// form. Every [`Operand::Target`] is encoded as a relative offset
    /// (target address minus this instruction's address), matching the
    /// Neo VM's branch/call encoding.
    pub fn serialise(&self) -> Vec<u8> {
        assert!(self.finalised, "serialise called before finalise");
        let mut out = Vec::with_capacity(self.bytecode_size() as usize);
        for &inst in &self.order {
            let instruction = &self.insts[inst];
            let Slot::Real { opcode, operand } = &instruction.slot else {
                continue;
            };
            out.push(opcode.byte());
            match operand {
                Operand::None => {}
                Operand::Bytes(bytes) => out.extend_from_slice(bytes),
                Operand::Target(target) => {
                    let delta = self.insts[*target].address as i64 - instruction.address as i64;
                    match opcode.max_operand_len() {
                        1 => out.push(delta as i8 as u8),
                        4 => out.extend_from_slice(&(delta as i32).to_le_bytes()),
                        n => unreachable!("unexpected target operand width {n}"),
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_a_prefix_sum_of_instruction_sizes() {
        let mut map = InstructionMap::new();
        map.insert(OpCode::Push1);
        map.insert_with_bytes(OpCode::PushInt32, &[0; 4]);
        map.insert(OpCode::Ret);
        map.finalise();
        assert_eq!(map.bytecode_size(), 1 + 5 + 1);
    }

    #[test]
    fn short_forward_jump_stays_short() {
        let mut map = InstructionMap::new();
        let target_placeholder = map.reserve();
        let jump = map.insert_branch(OpCode::Jmp, target_placeholder);
        map.insert(OpCode::Nop);
        let target = map.insert(OpCode::Ret);
        map.patch_branch(jump, OpCode::Jmp, target);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes[1], OpCode::Jmp.byte());
        assert_eq!(bytes[2] as i8, 3);
    }

    #[test]
    fn a_branch_whose_delta_overflows_i8_is_relaxed_to_its_long_form() {
        let mut map = InstructionMap::new();
        let placeholder = map.reserve();
        let jump = map.insert_branch(OpCode::Jmp, placeholder);
        // Pad past i8 range so the eventual delta cannot fit one byte.
        for _ in 0..130 {
            map.insert(OpCode::Nop);
        }
        let target = map.insert(OpCode::Ret);
        map.patch_branch(jump, OpCode::Jmp, target);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes[0], OpCode::JmpL.byte());
    }

    #[test]
    fn marker_contributes_no_bytes_and_takes_on_the_next_instructions_address() {
        let mut map = InstructionMap::new();
        let placeholder = map.reserve();
        let jump = map.insert_branch(OpCode::JmpIfNot, placeholder);
        let after = map.insert_marker();
        let ret = map.insert(OpCode::Ret);
        map.patch_branch(jump, OpCode::JmpIfNot, after);
        map.finalise();
        assert_eq!(map.address_of(after), map.address_of(ret));
        let bytes = map.serialise();
        assert_eq!(bytes, vec![OpCode::JmpIfNot.byte(), 2, OpCode::Ret.byte()]);
    }

    #[test]
    fn relocate_to_end_preserves_relative_order_of_the_moved_block() {
        let mut map = InstructionMap::new();
        let a = map.insert(OpCode::Push1);
        let b = map.insert(OpCode::Push2);
        map.insert(OpCode::Ret);
        map.relocate_to_end(a, b);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes, vec![OpCode::Ret.byte(), OpCode::Push1.byte(), OpCode::Push2.byte()]);
    }

    #[test]
    fn relocate_to_head_moves_the_designated_entry_to_offset_zero() {
        let mut map = InstructionMap::new();
        map.insert(OpCode::Push1);
        map.insert(OpCode::Push2);
        let entry = map.insert(OpCode::PushM1);
        map.insert(OpCode::Ret);
        map.relocate_to_head(entry);
        map.finalise();
        assert_eq!(map.address_of(entry), 0);
        let bytes = map.serialise();
        assert_eq!(
            bytes,
            vec![
                OpCode::PushM1.byte(),
                OpCode::Ret.byte(),
                OpCode::Push1.byte(),
                OpCode::Push2.byte(),
            ]
        );
    }

    #[test]
    fn relocate_to_head_is_a_no_op_when_already_first() {
        let mut map = InstructionMap::new();
        let entry = map.insert(OpCode::Push1);
        map.insert(OpCode::Ret);
        map.relocate_to_head(entry);
        map.finalise();
        assert_eq!(map.address_of(entry), 0);
    }
}
