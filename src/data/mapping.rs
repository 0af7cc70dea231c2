//! Per-slice contiguous buffers and the pack/unpack layout that walks
//! non-contiguous sub-slices through them.

use laik_space::{Dims, Index, Slice};

use crate::element::ElementType;

/// Row-major layout of a mapping's backing buffer over its `slice`. Exists
/// so pack/unpack can walk an arbitrary 2D/3D sub-slice of a mapping
/// without the engine needing to know how elements are laid out in
/// memory.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
	dims: Dims,
	slice: Slice,
}

impl Layout {
	pub fn new(dims: Dims, slice: Slice) -> Self {
		Layout { dims, slice }
	}

	fn strides(&self) -> [u64; 3] {
		let e = [self.slice.extent(0), self.slice.extent(1), self.slice.extent(2)];
		match self.dims {
			Dims::One => [1, 0, 0],
			Dims::Two => [1, e[0].max(1), 0],
			Dims::Three => [1, e[0].max(1), e[0].max(1) * e[1].max(1)],
		}
	}

	/// Linear offset of `idx` within this mapping's buffer, relative to
	/// `slice.from`.
	pub fn offset(&self, idx: Index) -> u64 {
		let strides = self.strides();
		let mut off = 0u64;
		for d in 0..self.dims.count() {
			off += (idx.get(d) - self.slice.from.get(d)) * strides[d];
		}
		off
	}

	/// Advance `cursor` by one element in row-major order within `bound`
	/// (a sub-slice of this mapping's `slice`). Returns `false` once the
	/// cursor has walked past `bound.to`.
	fn advance(&self, cursor: &mut Index, bound: Slice) -> bool {
		// increment the fastest-varying (dim 0) coordinate first, carrying
		// into higher dimensions, matching the offset/stride order above.
		for d in 0..self.dims.count() {
			let next = cursor.get(d) + 1;
			if next < bound.to.get(d) {
				cursor.set(d, next);
				return true;
			}
			if d + 1 == self.dims.count() {
				return false;
			}
			cursor.set(d, bound.from.get(d));
		}
		false
	}

	/// `pack(map, slice, &mut cursor, outBuf) -> elements written`. Walks
	/// `sub_slice` (a subset of this mapping's own `slice`) starting at
	/// `*cursor`, copying into `out` until either `out` is full or the
	/// cursor reaches `sub_slice.to`. Advances `*cursor`.
	pub fn pack<T: ElementType>(&self, data: &[T], sub_slice: Slice, cursor: &mut Index, out: &mut [T]) -> usize {
		if laik_space::slice_is_empty(self.dims, sub_slice) {
			return 0;
		}
		let mut written = 0;
		loop {
			if written >= out.len() {
				break;
			}
			let off = self.offset(*cursor) as usize;
			out[written] = data[off];
			written += 1;
			if !self.advance(cursor, sub_slice) {
				*cursor = sub_slice.to;
				break;
			}
		}
		written
	}

	/// Symmetric `unpack`: consumes `src` into this mapping's buffer at the
	/// positions `sub_slice` describes, starting at `*cursor`.
	pub fn unpack<T: ElementType>(&self, data: &mut [T], sub_slice: Slice, cursor: &mut Index, src: &[T]) -> usize {
		if laik_space::slice_is_empty(self.dims, sub_slice) {
			return 0;
		}
		let mut read = 0;
		loop {
			if read >= src.len() {
				break;
			}
			let off = self.offset(*cursor) as usize;
			data[off] = src[read];
			read += 1;
			if !self.advance(cursor, sub_slice) {
				*cursor = sub_slice.to;
				break;
			}
		}
		read
	}
}

/// A per-slice contiguous buffer: `(base, slice, layout)`. Owned by
/// exactly one `Data` at a time; ownership transfers atomically at a
/// switch.
pub struct Mapping<T: ElementType> {
	pub slice: Slice,
	pub layout: Layout,
	pub base: Vec<T>,
}

impl<T: ElementType> Mapping<T> {
	pub fn new(dims: Dims, slice: Slice, fill: T) -> Self {
		let layout = Layout::new(dims, slice);
		let count = slice.size(dims) as usize;
		Mapping {
			slice,
			layout,
			base: vec![fill; count],
		}
	}

	pub fn contains(&self, idx: Index) -> bool {
		let off = self.layout.offset(idx) as usize;
		off < self.base.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pack_unpack_roundtrip_1d() {
		let dims = Dims::One;
		let slice = Slice::new(Index::new(0, 0, 0), Index::new(10, 0, 0));
		let mut map = Mapping::<i32>::new(dims, slice, 0);
		for (i, v) in map.base.iter_mut().enumerate() {
			*v = i as i32;
		}

		let sub = Slice::new(Index::new(2, 0, 0), Index::new(7, 0, 0));
		let mut cursor = sub.from;
		let mut buf = vec![0i32; 5];
		let n = map.layout.pack(&map.base, sub, &mut cursor, &mut buf);
		assert_eq!(n, 5);
		assert_eq!(buf, vec![2, 3, 4, 5, 6]);
		assert_eq!(cursor, sub.to);

		let mut dst = Mapping::<i32>::new(dims, slice, -1);
		let mut cursor2 = sub.from;
		let m = dst.layout.unpack(&mut dst.base, sub, &mut cursor2, &buf);
		assert_eq!(m, 5);
		assert_eq!(&dst.base[2..7], &[2, 3, 4, 5, 6]);
	}

	#[test]
	fn pack_partial_fill_resumes_from_cursor() {
		let dims = Dims::One;
		let slice = Slice::new(Index::new(0, 0, 0), Index::new(6, 0, 0));
		let mut map = Mapping::<i32>::new(dims, slice, 0);
		for (i, v) in map.base.iter_mut().enumerate() {
			*v = i as i32;
		}
		let sub = slice;
		let mut cursor = sub.from;
		let mut buf = [0i32; 4];
		let n1 = map.layout.pack(&map.base, sub, &mut cursor, &mut buf);
		assert_eq!(n1, 4);
		assert_eq!(buf, [0, 1, 2, 3]);

		let mut buf2 = [0i32; 4];
		let n2 = map.layout.pack(&map.base, sub, &mut cursor, &mut buf2);
		assert_eq!(n2, 2);
		assert_eq!(&buf2[..2], &[4, 5]);
	}

	#[test]
	fn pack_2d_subslice() {
		let dims = Dims::Two;
		let slice = Slice::new(Index::new(0, 0, 0), Index::new(4, 4, 0));
		let mut map = Mapping::<i32>::new(dims, slice, 0);
		for y in 0..4u64 {
			for x in 0..4u64 {
				let off = map.layout.offset(Index::new(x, y, 0)) as usize;
				map.base[off] = (y * 4 + x) as i32;
			}
		}
		let sub = Slice::new(Index::new(1, 1, 0), Index::new(3, 3, 0));
		let mut cursor = sub.from;
		let mut buf = vec![0i32; 4];
		let n = map.layout.pack(&map.base, sub, &mut cursor, &mut buf);
		assert_eq!(n, 4);
		assert_eq!(buf, vec![5, 6, 9, 10]);
	}
}
