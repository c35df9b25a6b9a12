#![no_main]
use fusewatt::codec::{decode, DType, Scaling};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut regs = Vec::new();
    let mut it = data.chunks_exact(2);
    for b in &mut it {
        regs.push(u16::from_be_bytes([b[0], b[1]]));
    }

    for dtype in [DType::U16, DType::S16, DType::U32, DType::S32, DType::U64, DType::S64] {
        let _ = decode(dtype, &regs, None);
        let _ = decode(dtype, &regs, Some(&Scaling::Fix1));
        let _ = decode(dtype, &regs, Some(&Scaling::Fix2));
        let _ = decode(dtype, &regs, Some(&Scaling::Temp));
    }
});
