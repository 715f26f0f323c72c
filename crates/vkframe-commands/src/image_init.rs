//! Staged image uploads.
//!
//! Image data is expected tightly packed and mip-major: level 0 for all array layers, then level 1 and so on. See
//! [mip_chain] for the exact layout. Container headers (like the one of a DDS file) can be skipped via `header_skip`.

use vkframe::{
    TransitionError,
    allocator::{Allocator, MemoryUsage},
    ash::vk,
    context::{Ctx, QueueRole},
    resources::{Buffer, Image, ImgDesc},
    state::ImageState,
    util::{MipLevel, TexelBlock, extent_to_offset, mip_chain, mip_chain_size, mip_extent},
};

use crate::{ScopedCommands, SubmitMode, TransferError, with_scoped_commands};

///Where the mip levels of an uploaded image come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MipSource {
    ///The data contains every mip level of the image. The image ends up in [ImageState::ShaderRead].
    Provided,
    ///The data contains level 0, the other levels are blitted from it. The image ends up in [ImageState::ShaderRead].
    Generate,
    ///The data contains level 0. All levels are left in [ImageState::CopyDestination] for the caller to fill.
    Deferred,
}

impl MipSource {
    fn uploaded_levels(&self, image_levels: u32) -> u32 {
        match self {
            MipSource::Provided => image_levels,
            MipSource::Generate | MipSource::Deferred => 1,
        }
    }
}

///Copy regions for each level of `chain` into `image`. Offsets are relative to the staging buffer start.
pub fn copy_regions(chain: &[MipLevel], image: &Image) -> Vec<vk::BufferImageCopy> {
    chain
        .iter()
        .map(|level| vk::BufferImageCopy {
            buffer_offset: level.offset,
            //always copying tightly packed.
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: image.subresource_layers(level.level),
            image_offset: vk::Offset3D::default(),
            image_extent: level.extent,
        })
        .collect()
}

///Blit that downsamples mip `level - 1` of `image` into `level`.
pub fn blit_region(image: &Image, level: u32) -> vk::ImageBlit {
    debug_assert!(level > 0, "level 0 has no source level");
    let extent = image.extent_3d();
    vk::ImageBlit {
        src_subresource: image.subresource_layers(level - 1),
        src_offsets: [
            vk::Offset3D::default(),
            extent_to_offset(mip_extent(extent, level - 1), true),
        ],
        dst_subresource: image.subresource_layers(level),
        dst_offsets: [
            vk::Offset3D::default(),
            extent_to_offset(mip_extent(extent, level), true),
        ],
    }
}

///Format features needed to blit an optimal tiling image into itself with a linear filter.
const MIP_BLIT_FEATURES: vk::FormatFeatureFlags = vk::FormatFeatureFlags::from_raw(
    vk::FormatFeatureFlags::BLIT_SRC.as_raw()
        | vk::FormatFeatureFlags::BLIT_DST.as_raw()
        | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR.as_raw(),
);

fn missing_mip_features(optimal_tiling: vk::FormatFeatureFlags) -> vk::FormatFeatureFlags {
    MIP_BLIT_FEATURES & !optimal_tiling
}

fn check_mip_generation<A: Allocator + Send + Sync + 'static>(
    ctx: &Ctx<A>,
    image: &Image,
) -> Result<(), TransferError> {
    let properties = ctx.device.format_properties(image.desc.format);
    let missing = missing_mip_features(properties.optimal_tiling_features);
    if !missing.is_empty() {
        #[cfg(feature = "logging")]
        log::error!(
            "Format {:?} lacks {:?}, can not generate mip maps",
            image.desc.format,
            missing
        );
        return Err(TransferError::MissingFormatFeatures {
            format: image.desc.format,
            missing,
        });
    }

    let needed = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if !image.desc.usage.contains(needed) {
        return Err(TransferError::MissingUsage {
            missing: needed,
            found: image.desc.usage,
        });
    }
    Ok(())
}

//Level 0 and every other level are in CopyDestination. Each level is read by the blit into the next one, then
//becomes readable by shaders.
fn record_mip_generation(scope: &ScopedCommands, image: &mut Image) -> Result<(), TransitionError> {
    let tracker = scope.state_tracker();
    let levels = image.mip_levels();
    for level in 1..levels {
        tracker.transition_level(image, level - 1, ImageState::CopySource)?;
        let blit = blit_region(image, level);
        unsafe {
            scope.device().cmd_blit_image(
                scope.command_buffer(),
                image.inner,
                ImageState::CopySource.layout(),
                image.inner,
                ImageState::CopyDestination.layout(),
                &[blit],
                vk::Filter::LINEAR,
            )
        };
        tracker.transition_level(image, level - 1, ImageState::ShaderRead)?;
    }
    tracker.transition_level(image, levels - 1, ImageState::ShaderRead)
}

///Uploads `data` into `image`, which must not have been used yet (all levels [ImageState::Undefined]).
///
/// The first `header_skip` bytes of `data` are ignored. The rest must match the mip chain of `image` for `block` and
/// `mips` exactly, otherwise [TransferError::SizeMismatch] is returned before any device work happens.
///
/// Returns when the upload has finished on the graphics queue.
pub fn upload_image<A: Allocator + Send + Sync + 'static>(
    ctx: &Ctx<A>,
    image: &mut Image,
    data: &[u8],
    header_skip: usize,
    block: TexelBlock,
    mips: MipSource,
) -> Result<(), TransferError> {
    let Some(data) = data.get(header_skip..) else {
        return Err(TransferError::SizeMismatch {
            expected: header_skip as u64,
            found: data.len() as u64,
        });
    };

    let chain = mip_chain(
        image.extent_3d(),
        mips.uploaded_levels(image.mip_levels()),
        image.layer_count(),
        block,
    );
    let expected = mip_chain_size(&chain);
    if expected != data.len() as u64 {
        #[cfg(feature = "logging")]
        log::error!(
            "Image data of {} bytes does not match the {} bytes of {} mip level(s)",
            data.len(),
            expected,
            chain.len()
        );
        return Err(TransferError::SizeMismatch {
            expected,
            found: data.len() as u64,
        });
    }

    match image.state() {
        Some(ImageState::Undefined) => {}
        Some(found) => {
            return Err(TransitionError::StateMismatch {
                expected: ImageState::Undefined,
                found,
            }
            .into());
        }
        None => return Err(TransitionError::NonUniformLevels.into()),
    }

    if mips == MipSource::Generate {
        check_mip_generation(ctx, image)?;
    }

    let staging =
        Buffer::new_staging_for_data(&ctx.device, &ctx.allocator, Some("ImageStagingBuffer"), data)?;

    #[cfg(feature = "logging")]
    log::info!(
        "Uploading {} bytes into {:?} image {:?} ({:?})",
        data.len(),
        image.desc.format,
        image.extent_3d(),
        mips
    );

    with_scoped_commands(ctx, QueueRole::Graphics, SubmitMode::Synchronous, |scope| {
        scope
            .state_tracker()
            .transition(image, ImageState::CopyDestination)?;

        let regions = copy_regions(&chain, image);
        unsafe {
            scope.device().cmd_copy_buffer_to_image(
                scope.command_buffer(),
                staging.inner,
                image.inner,
                ImageState::CopyDestination.layout(),
                &regions,
            )
        };

        match mips {
            MipSource::Provided => scope
                .state_tracker()
                .transition(image, ImageState::ShaderRead)?,
            MipSource::Generate => record_mip_generation(scope, image)?,
            MipSource::Deferred => {}
        }

        scope.keep_alive(staging);
        Ok::<_, TransferError>(())
    })
}

///Creates a Gpu exclusive image from `desc` and uploads `data` into it. See [upload_image] for the data layout.
///
/// `TRANSFER_DST` is added to the usage, and `TRANSFER_SRC` if mip levels are generated.
pub fn image_from_data<A: Allocator + Send + Sync + 'static>(
    ctx: &Ctx<A>,
    mut desc: ImgDesc,
    name: Option<&str>,
    data: &[u8],
    header_skip: usize,
    block: TexelBlock,
    mips: MipSource,
) -> Result<Image, TransferError> {
    desc.usage |= vk::ImageUsageFlags::TRANSFER_DST;
    if mips == MipSource::Generate {
        desc.usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }

    let mut image = ctx.create_image_from_desc(desc, MemoryUsage::GpuOnly, name)?;
    upload_image(ctx, &mut image, data, header_skip, block, mips)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_levels() {
        assert_eq!(MipSource::Provided.uploaded_levels(10), 10);
        assert_eq!(MipSource::Generate.uploaded_levels(10), 1);
        assert_eq!(MipSource::Deferred.uploaded_levels(10), 1);
    }

    #[test]
    fn mip_generation_needs_blit_and_linear_filter() {
        let sampled = vk::FormatFeatureFlags::SAMPLED_IMAGE
            | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
        assert_eq!(
            missing_mip_features(sampled),
            vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST
        );
        assert_eq!(
            missing_mip_features(sampled | vk::FormatFeatureFlags::BLIT_SRC),
            vk::FormatFeatureFlags::BLIT_DST
        );
        assert_eq!(
            missing_mip_features(vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST),
            vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR
        );
        assert!(missing_mip_features(sampled | MIP_BLIT_FEATURES).is_empty());
    }

    #[test]
    fn generated_levels_halve_down_to_one() {
        let extent = vk::Extent3D {
            width: 16,
            height: 4,
            depth: 1,
        };
        let offsets = (0..5)
            .map(|level| extent_to_offset(mip_extent(extent, level), true))
            .map(|o| (o.x, o.y, o.z))
            .collect::<Vec<_>>();
        assert_eq!(
            offsets,
            vec![(16, 4, 1), (8, 2, 1), (4, 1, 1), (2, 1, 1), (1, 1, 1)]
        );
    }

    #[test]
    fn region_offsets_follow_chain() {
        let extent = vk::Extent3D {
            width: 64,
            height: 64,
            depth: 1,
        };
        let chain = mip_chain(extent, 7, 1, TexelBlock::linear(4));
        let offsets = chain.iter().map(|l| l.offset).collect::<Vec<_>>();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 64 * 64 * 4);
        assert_eq!(offsets[2], 64 * 64 * 4 + 32 * 32 * 4);
        assert_eq!(mip_chain_size(&chain), chain[6].offset + 4);
    }
}
