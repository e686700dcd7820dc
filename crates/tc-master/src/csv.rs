//! CSV export of recorded control signals.

use std::io::Write;

use tc_ir::Stream;

use crate::Recording;

/// Write one row per frame for the given voices, all eight streams each.
pub fn write_csv(w: &mut impl Write, rec: &Recording, voices: &[usize]) -> std::io::Result<()> {
    write_header(w, voices)?;
    for frame in 0..rec.frames() {
        write!(w, "{}", frame)?;
        for &voice in voices {
            for stream in Stream::ALL {
                write!(w, ",{}", rec.stream(voice, stream)[frame])?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn recording_to_csv(rec: &Recording, voices: &[usize]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rec, voices).expect("Vec<u8> write cannot fail");
    buf
}

fn write_header(w: &mut impl Write, voices: &[usize]) -> std::io::Result<()> {
    w.write_all(b"frame")?;
    for &voice in voices {
        for stream in Stream::ALL {
            write!(w, ",v{}.{}", voice, stream.name())?;
        }
    }
    writeln!(w)
}
