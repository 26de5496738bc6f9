//! 姿态序列化的基础读写
//!
//! 所有数值均为小端序；字符串为 u32 字节长度 + UTF-8。

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Mat4, Quat, Vec3};

use crate::{RigError, Result};

/// 字符串长度上限，防止损坏数据触发超大分配
const MAX_STRING_LEN: u32 = 1 << 16;

pub fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    reader.read_u32::<LittleEndian>()
        .map_err(|e| RigError::Format(format!("Failed to read {}: {}", what, e)))
}

pub fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    reader.read_i32::<LittleEndian>()
        .map_err(|e| RigError::Format(format!("Failed to read {}: {}", what, e)))
}

pub fn read_u8<R: Read>(reader: &mut R, what: &str) -> Result<u8> {
    reader.read_u8()
        .map_err(|e| RigError::Format(format!("Failed to read {}: {}", what, e)))
}

pub fn read_f32<R: Read>(reader: &mut R, what: &str) -> Result<f32> {
    reader.read_f32::<LittleEndian>()
        .map_err(|e| RigError::Format(format!("Failed to read {}: {}", what, e)))
}

pub fn read_vec3<R: Read>(reader: &mut R, what: &str) -> Result<Vec3> {
    let x = read_f32(reader, what)?;
    let y = read_f32(reader, what)?;
    let z = read_f32(reader, what)?;
    Ok(Vec3::new(x, y, z))
}

/// 四元数按 (x, y, z, w) 顺序
pub fn read_quat<R: Read>(reader: &mut R, what: &str) -> Result<Quat> {
    let x = read_f32(reader, what)?;
    let y = read_f32(reader, what)?;
    let z = read_f32(reader, what)?;
    let w = read_f32(reader, what)?;
    Ok(Quat::from_xyzw(x, y, z, w))
}

/// 矩阵按列主序 16 个 float
pub fn read_mat4<R: Read>(reader: &mut R, what: &str) -> Result<Mat4> {
    let mut cols = [0.0f32; 16];
    for value in cols.iter_mut() {
        *value = read_f32(reader, what)?;
    }
    Ok(Mat4::from_cols_array(&cols))
}

pub fn read_string<R: Read>(reader: &mut R, what: &str) -> Result<String> {
    let len = read_u32(reader, what)?;
    if len > MAX_STRING_LEN {
        return Err(RigError::Format(format!("{} length {} exceeds limit", what, len)));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)
        .map_err(|e| RigError::Format(format!("Failed to read {}: {}", what, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| RigError::Format(format!("Invalid UTF-8 in {}: {}", what, e)))
}

pub fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> Result<()> {
    for value in v.to_array() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}

pub fn write_quat<W: Write>(writer: &mut W, q: Quat) -> Result<()> {
    for value in q.to_array() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}

pub fn write_mat4<W: Write>(writer: &mut W, m: &Mat4) -> Result<()> {
    for value in m.to_cols_array() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}

pub fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_u32::<LittleEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}
