//! Helpers that describe images on the host side: aspect masks, texel blocks and the byte layout of mip chains.

use ash::vk;

///Converts a [Extent3D](ash::vk::Extent3D) to an offset. Needed for instance to convert
/// an image's extent to the offset parameter for image-blit or copy operations.
///
/// If `zero_to_one` is set, makes coordinates 1 that are 0 in the extent. This is for instance the requirement on the `dst_offset` parameter
/// of image_blit.
pub fn extent_to_offset(extent: vk::Extent3D, zero_to_one: bool) -> vk::Offset3D {
    if zero_to_one {
        vk::Offset3D {
            //Note: max is correct since we are casting from a u32
            x: (extent.width as i32).max(1),
            y: (extent.height as i32).max(1),
            z: (extent.depth as i32).max(1),
        }
    } else {
        vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: extent.depth as i32,
        }
    }
}

///Derives the aspect of an image from its format. Depth formats get the depth aspect, formats with a stencil
/// component additionally (or only) the stencil aspect. Everything else is a color image.
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    let mut aspect = vk::ImageAspectFlags::empty();
    if matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    ) {
        aspect |= vk::ImageAspectFlags::DEPTH;
    }
    if matches!(
        format,
        vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    ) {
        aspect |= vk::ImageAspectFlags::STENCIL;
    }

    if aspect.is_empty() {
        vk::ImageAspectFlags::COLOR
    } else {
        aspect
    }
}

///Smallest addressable unit of an image's memory. For uncompressed formats that is a single texel, for block compressed
/// formats a block of 4x4 texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TexelBlock {
    ///Size of one block in bytes.
    pub bytes: u32,
    pub width: u32,
    pub height: u32,
}

impl TexelBlock {
    pub const fn linear(bytes_per_texel: u32) -> Self {
        TexelBlock {
            bytes: bytes_per_texel,
            width: 1,
            height: 1,
        }
    }

    ///4x4 block compression (BC1-7) with `bytes` per block. BC1 and BC4 use 8, the others 16.
    pub const fn compressed(bytes: u32) -> Self {
        TexelBlock {
            bytes,
            width: 4,
            height: 4,
        }
    }

    ///Block layout of common formats. Returns `None` for formats that are not listed, in which case the caller has to
    /// supply the block itself.
    pub fn for_format(format: vk::Format) -> Option<Self> {
        let block = match format {
            vk::Format::R8_UNORM
            | vk::Format::R8_SNORM
            | vk::Format::R8_UINT
            | vk::Format::R8_SRGB
            | vk::Format::S8_UINT => Self::linear(1),
            vk::Format::R8G8_UNORM
            | vk::Format::R8G8_SRGB
            | vk::Format::R16_UNORM
            | vk::Format::R16_SFLOAT
            | vk::Format::R16_UINT
            | vk::Format::R5G6B5_UNORM_PACK16
            | vk::Format::D16_UNORM => Self::linear(2),
            vk::Format::R8G8B8_UNORM | vk::Format::R8G8B8_SRGB | vk::Format::B8G8R8_UNORM => {
                Self::linear(3)
            }
            vk::Format::R8G8B8A8_UNORM
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::A2B10G10R10_UNORM_PACK32
            | vk::Format::R16G16_SFLOAT
            | vk::Format::R32_SFLOAT
            | vk::Format::R32_UINT
            | vk::Format::D32_SFLOAT
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D24_UNORM_S8_UINT => Self::linear(4),
            vk::Format::R16G16B16A16_UNORM
            | vk::Format::R16G16B16A16_SFLOAT
            | vk::Format::R32G32_SFLOAT => Self::linear(8),
            vk::Format::R32G32B32_SFLOAT => Self::linear(12),
            vk::Format::R32G32B32A32_SFLOAT | vk::Format::R32G32B32A32_UINT => Self::linear(16),
            vk::Format::BC1_RGB_UNORM_BLOCK
            | vk::Format::BC1_RGB_SRGB_BLOCK
            | vk::Format::BC1_RGBA_UNORM_BLOCK
            | vk::Format::BC1_RGBA_SRGB_BLOCK
            | vk::Format::BC4_UNORM_BLOCK
            | vk::Format::BC4_SNORM_BLOCK => Self::compressed(8),
            vk::Format::BC2_UNORM_BLOCK
            | vk::Format::BC2_SRGB_BLOCK
            | vk::Format::BC3_UNORM_BLOCK
            | vk::Format::BC3_SRGB_BLOCK
            | vk::Format::BC5_UNORM_BLOCK
            | vk::Format::BC5_SNORM_BLOCK
            | vk::Format::BC6H_UFLOAT_BLOCK
            | vk::Format::BC6H_SFLOAT_BLOCK
            | vk::Format::BC7_UNORM_BLOCK
            | vk::Format::BC7_SRGB_BLOCK => Self::compressed(16),
            _ => return None,
        };
        Some(block)
    }

    ///Bytes needed for one layer of an image of `extent` in this block layout. Partial blocks at the border round up.
    pub fn bytes_for(&self, extent: vk::Extent3D) -> u64 {
        let blocks_x = extent.width.div_ceil(self.width) as u64;
        let blocks_y = extent.height.div_ceil(self.height) as u64;
        blocks_x * blocks_y * extent.depth.max(1) as u64 * self.bytes as u64
    }
}

///Number of levels of a full mip chain, `floor(log2(max(width, height, depth))) + 1`.
pub fn mip_level_count(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    largest.ilog2() + 1
}

///Extent of mip `level` of an image with the base `extent`. Each level halves every dimension, but never below 1.
pub fn mip_extent(extent: vk::Extent3D, level: u32) -> vk::Extent3D {
    vk::Extent3D {
        width: (extent.width >> level).max(1),
        height: (extent.height >> level).max(1),
        depth: (extent.depth >> level).max(1),
    }
}

///Placement of one mip level inside a tightly packed staging buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipLevel {
    pub level: u32,
    ///Byte offset relative to the start of the chain (after any header).
    pub offset: u64,
    ///Size of the level in bytes, including all array layers.
    pub size: u64,
    pub extent: vk::Extent3D,
}

///Computes the layout of `levels` mip levels with `layers` array layers each. Levels are stored one after another,
/// starting with the largest. All layers of a level are contiguous.
pub fn mip_chain(extent: vk::Extent3D, levels: u32, layers: u32, block: TexelBlock) -> Vec<MipLevel> {
    let mut offset = 0;
    (0..levels)
        .map(|level| {
            let extent = mip_extent(extent, level);
            let size = block.bytes_for(extent) * layers.max(1) as u64;
            let mip = MipLevel {
                level,
                offset,
                size,
                extent,
            };
            offset += size;
            mip
        })
        .collect()
}

///Total number of bytes of a chain computed by [mip_chain].
pub fn mip_chain_size(chain: &[MipLevel]) -> u64 {
    chain.last().map(|l| l.offset + l.size).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent3D {
        vk::Extent3D {
            width,
            height,
            depth: 1,
        }
    }

    #[test]
    fn aspects() {
        assert_eq!(
            aspect_for_format(vk::Format::R8G8B8A8_UNORM),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(
            aspect_for_format(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_for_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_for_format(vk::Format::S8_UINT),
            vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_for_format(vk::Format::BC7_UNORM_BLOCK),
            vk::ImageAspectFlags::COLOR
        );
    }

    #[test]
    fn level_counts() {
        assert_eq!(mip_level_count(1, 1, 1), 1);
        assert_eq!(mip_level_count(256, 256, 1), 9);
        assert_eq!(mip_level_count(300, 20, 1), 9);
        assert_eq!(mip_level_count(1024, 1, 1), 11);
        assert_eq!(mip_level_count(0, 0, 0), 1);
    }

    #[test]
    fn extents_clamp_at_one() {
        let base = extent(16, 4);
        assert_eq!(mip_extent(base, 2), extent(4, 1));
        assert_eq!(mip_extent(base, 4), extent(1, 1));
    }

    #[test]
    fn linear_chain_accounting() {
        let header = 128u64;
        let base = extent(300, 20);
        let levels = mip_level_count(300, 20, 1);
        let block = TexelBlock::linear(4);

        let expected: u64 = (0..levels)
            .map(|l| {
                let e = mip_extent(base, l);
                e.width as u64 * e.height as u64 * 4
            })
            .sum();
        let staging_size = header + expected;

        let chain = mip_chain(base, levels, 1, block);
        assert_eq!(chain.len(), levels as usize);
        assert_eq!(chain.iter().map(|l| l.size).sum::<u64>(), staging_size - header);
        assert_eq!(mip_chain_size(&chain), staging_size - header);
        for pair in chain.windows(2) {
            assert_eq!(pair[0].offset + pair[0].size, pair[1].offset);
        }
    }

    #[test]
    fn compressed_chain_accounting() {
        //DXT1 / BC1, 8 bytes per 4x4 block
        let base = extent(256, 64);
        let levels = mip_level_count(256, 64, 1);
        let chain = mip_chain(base, levels, 1, TexelBlock::compressed(8));

        //levels below 4x4 still occupy one full block
        let last = chain.last().unwrap();
        assert_eq!(last.extent, extent(1, 1));
        assert_eq!(last.size, 8);
        assert_eq!(chain[0].size, 64 * 16 * 8);

        let header = 148u64;
        let expected: u64 = (0..levels)
            .map(|l| {
                let e = mip_extent(base, l);
                (e.width.div_ceil(4) * e.height.div_ceil(4)) as u64 * 8
            })
            .sum();
        assert_eq!(mip_chain_size(&chain), (header + expected) - header);

        //BC3, 16 bytes per block
        let chain16 = mip_chain(base, levels, 1, TexelBlock::compressed(16));
        assert_eq!(mip_chain_size(&chain16), 2 * mip_chain_size(&chain));
    }

    #[test]
    fn layers_are_contiguous_per_level() {
        let chain = mip_chain(extent(8, 8), 2, 6, TexelBlock::linear(4));
        assert_eq!(chain[0].size, 8 * 8 * 4 * 6);
        assert_eq!(chain[1].offset, chain[0].size);
        assert_eq!(chain[1].size, 4 * 4 * 4 * 6);
    }

    #[test]
    fn known_blocks() {
        assert_eq!(
            TexelBlock::for_format(vk::Format::BC1_RGBA_UNORM_BLOCK),
            Some(TexelBlock::compressed(8))
        );
        assert_eq!(
            TexelBlock::for_format(vk::Format::R8G8B8A8_SRGB),
            Some(TexelBlock::linear(4))
        );
        assert_eq!(TexelBlock::for_format(vk::Format::UNDEFINED), None);
    }

    #[test]
    fn offsets_for_blits() {
        let e = vk::Extent3D {
            width: 4,
            height: 0,
            depth: 0,
        };
        assert_eq!(extent_to_offset(e, true), vk::Offset3D { x: 4, y: 1, z: 1 });
        assert_eq!(extent_to_offset(e, false), vk::Offset3D { x: 4, y: 0, z: 0 });
    }
}
