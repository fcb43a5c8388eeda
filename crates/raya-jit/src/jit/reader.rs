//! P-code reader (spec.md §4.2): a forward-only cursor over one function's
//! bytecode within the plugin's shared code image.

use crate::pcode::{CodeImage, Opcode};

/// Cursor over the code image, starting at a function's `PROC` offset.
///
/// Ordering is strictly forward; there is no rewind. The reader does not
/// know function boundaries itself — the compile driver enforces them by
/// peeking the next opcode before consuming it (§4.2).
pub struct Reader<'a> {
    image: &'a CodeImage,
    cip: usize,
}

impl<'a> Reader<'a> {
    /// `begin()` (§4.2): start the cursor at `pcode_offset`.
    pub fn begin(image: &'a CodeImage, pcode_offset: usize) -> Self {
        Reader { image, cip: pcode_offset }
    }

    /// Current instruction's byte address within the code segment.
    pub fn cip(&self) -> usize {
        self.cip
    }

    /// Bytes remain and decoding can continue. Does not itself check the
    /// function-boundary stop condition — that is `peek_opcode` plus the
    /// driver's own decision (§4.2: "The reader does not know function
    /// boundaries").
    pub fn more(&self) -> bool {
        self.image.contains(self.cip)
    }

    /// Decode the next opcode without consuming it.
    pub fn peek_opcode(&self) -> Option<Opcode> {
        self.image.bytes().get(self.cip).copied().and_then(Opcode::from_u8)
    }

    /// Consume the next opcode and its operand bytes, returning the
    /// instruction's cip and opcode. The caller (the driver's decode loop)
    /// dispatches this to the per-opcode visitor itself; this type only
    /// advances the cursor.
    pub fn visit_next(&mut self) -> Option<(usize, Opcode)> {
        let cip = self.cip;
        let opcode = self.peek_opcode()?;
        self.cip += 1 + opcode.operand_size();
        Some((cip, opcode))
    }

    /// Raw operand bytes for the instruction that starts at `cip`, given its
    /// opcode's known operand size. Used by opcode visitors that need the
    /// operand payload (jump displacement, local slot index, constant).
    pub fn operand_bytes(&self, cip: usize, opcode: Opcode) -> &'a [u8] {
        let start = cip + 1;
        &self.image.bytes()[start..start + opcode.operand_size()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visits_instructions_in_order_advancing_by_operand_size() {
        // PROC(2) local_count=0, NOP, CONST_I32(4) = 1, RETURN, ENDPROC
        let bytes = vec![
            0xF0, 0x00, 0x00, // PROC, operand u16
            0x00, // NOP
            0x02, 0x01, 0x00, 0x00, 0x00, // CONST_I32 1
            0x32, // RETURN
            0xF1, // ENDPROC
        ];
        let image = CodeImage::new(bytes);
        let mut reader = Reader::begin(&image, 0);

        let (cip0, op0) = reader.visit_next().unwrap();
        assert_eq!((cip0, op0), (0, Opcode::Proc));

        let (cip1, op1) = reader.visit_next().unwrap();
        assert_eq!((cip1, op1), (3, Opcode::Nop));

        let (cip2, op2) = reader.visit_next().unwrap();
        assert_eq!((cip2, op2), (4, Opcode::ConstI32));
        assert_eq!(reader.operand_bytes(cip2, op2), &[1, 0, 0, 0]);

        let (cip3, op3) = reader.visit_next().unwrap();
        assert_eq!((cip3, op3), (9, Opcode::Return));

        assert_eq!(reader.peek_opcode(), Some(Opcode::EndProc));
        assert_eq!(reader.cip(), 10);
    }

    #[test]
    fn more_is_false_past_image_end() {
        let image = CodeImage::new(vec![0xF1]);
        let mut reader = Reader::begin(&image, 0);
        assert!(reader.more());
        reader.visit_next();
        assert!(!reader.more());
    }
}
