mod common;

use vkframe::{
    allocator::MemoryUsage,
    ash::vk,
    context::QueueRole,
    resources::ImgDesc,
    state::ImageState,
    util::{TexelBlock, mip_chain, mip_chain_size, mip_level_count},
};
use vkframe_commands::{
    ScopedCommands, SubmitMode, TransferError,
    buffer_init::{buffer_from_data, download_buffer, upload_buffer},
    image_init::{MipSource, image_from_data, upload_image},
    with_scoped_commands,
};

use common::{XorShift, context};

#[test]
fn buffer_round_trip() {
    let Some(ctx) = context() else { return };
    let mut rng = XorShift::new(0x5eed);

    for size in [1usize, 64, 4096, 1 << 20] {
        let data = rng.bytes(size);
        let buffer = buffer_from_data(
            &ctx,
            vk::BufferUsageFlags::TRANSFER_SRC,
            Some("RoundTrip"),
            &data,
        )
        .expect("upload");
        assert_eq!(buffer.size(), size as u64);

        let mut readback = vec![0u8; size];
        download_buffer(&ctx, &buffer, 0, &mut readback).expect("download");
        assert!(readback == data, "round trip of {size} bytes differs");
    }
}

#[test]
fn partial_upload_keeps_rest() {
    let Some(ctx) = context() else { return };

    let buffer = buffer_from_data(
        &ctx,
        vk::BufferUsageFlags::TRANSFER_SRC,
        None,
        &[0u8; 256],
    )
    .expect("upload");
    upload_buffer(&ctx, &buffer, 64, &[0xab; 32]).expect("partial upload");

    let mut readback = vec![0u8; 256];
    download_buffer(&ctx, &buffer, 0, &mut readback).expect("download");
    assert!(readback[..64].iter().all(|b| *b == 0));
    assert!(readback[64..96].iter().all(|b| *b == 0xab));
    assert!(readback[96..].iter().all(|b| *b == 0));
}

#[test]
fn upload_out_of_bounds_fails() {
    let Some(ctx) = context() else { return };

    let buffer = ctx
        .create_buffer(
            16,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryUsage::GpuOnly,
            None,
        )
        .expect("buffer");
    assert!(matches!(
        upload_buffer(&ctx, &buffer, 8, &[1; 16]),
        Err(TransferError::BufferMap(_))
    ));
}

fn rgba_desc(size: u32, levels: u32) -> ImgDesc {
    ImgDesc::from_dims(
        size,
        size,
        1,
        levels,
        1,
        vk::Format::R8G8B8A8_UNORM,
        vk::ImageUsageFlags::SAMPLED,
        false,
    )
}

#[test]
fn image_upload_ends_shader_readable() {
    let Some(ctx) = context() else { return };
    let levels = mip_level_count(64, 64, 1);
    let block = TexelBlock::linear(4);

    let chain = mip_chain(rgba_desc(64, levels).extent, levels, 1, block);
    let header = 16;
    let data = XorShift::new(7).bytes(header + mip_chain_size(&chain) as usize);

    let image = image_from_data(
        &ctx,
        rgba_desc(64, levels),
        Some("Provided"),
        &data,
        header,
        block,
        MipSource::Provided,
    )
    .expect("upload");
    assert_eq!(image.mip_levels(), 7);
    assert_eq!(image.state(), Some(ImageState::ShaderRead));
}

#[test]
fn generated_mips_end_shader_readable() {
    let Some(ctx) = context() else { return };
    let levels = mip_level_count(32, 32, 1);
    let data = XorShift::new(11).bytes(32 * 32 * 4);

    let image = image_from_data(
        &ctx,
        rgba_desc(32, levels),
        Some("Generated"),
        &data,
        0,
        TexelBlock::linear(4),
        MipSource::Generate,
    )
    .expect("upload");
    for level in 0..levels {
        assert_eq!(image.level_state(level), Some(ImageState::ShaderRead));
    }
}

#[test]
fn deferred_mips_stay_copy_destination() {
    let Some(ctx) = context() else { return };
    let data = vec![0u8; 16 * 16 * 4];

    let image = image_from_data(
        &ctx,
        rgba_desc(16, 5),
        None,
        &data,
        0,
        TexelBlock::linear(4),
        MipSource::Deferred,
    )
    .expect("upload");
    assert_eq!(image.state(), Some(ImageState::CopyDestination));
}

#[test]
fn image_size_mismatch_leaves_image_untouched() {
    let Some(ctx) = context() else { return };
    let mut image = ctx
        .create_image_from_desc(
            rgba_desc(16, 1).add_usage(vk::ImageUsageFlags::TRANSFER_DST),
            MemoryUsage::GpuOnly,
            None,
        )
        .expect("image");

    let result = upload_image(
        &ctx,
        &mut image,
        &[0u8; 100],
        0,
        TexelBlock::linear(4),
        MipSource::Provided,
    );
    assert!(matches!(
        result,
        Err(TransferError::SizeMismatch {
            expected: 1024,
            found: 100
        })
    ));
    assert_eq!(image.state(), Some(ImageState::Undefined));
}

#[test]
fn scope_keeps_resources_until_done() {
    let Some(ctx) = context() else { return };
    let staging = vkframe::resources::Buffer::new_staging_for_data(
        &ctx.device,
        &ctx.allocator,
        None,
        &[1u32, 2, 3, 4],
    )
    .expect("staging");
    let mut target = ctx
        .create_buffer(
            16,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryUsage::GpuToCpu,
            None,
        )
        .expect("target");

    {
        let mut scope = ScopedCommands::new(&ctx, QueueRole::Graphics, SubmitMode::Asynchronous)
            .expect("scope");
        let (src, dst) = (staging.inner, target.inner);
        scope.record(|device, cb| unsafe {
            device.cmd_copy_buffer(
                cb,
                src,
                dst,
                &[vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: 16,
                }],
            );
            //the target is mapped and read on the host below
            let host_read = [vk::MemoryBarrier2::default()
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
                .dst_access_mask(vk::AccessFlags2::HOST_READ)
                .dst_stage_mask(vk::PipelineStageFlags2::HOST)];
            device.cmd_pipeline_barrier2(
                cb,
                &vk::DependencyInfo::default().memory_barriers(&host_read),
            );
        });
        scope.keep_alive(staging);
        //submitted on drop
    }

    let mut readback = [0u8; 16];
    target.read(0, &mut readback).expect("read");
    assert_eq!(&readback[..], bytemuck::cast_slice::<u32, u8>(&[1, 2, 3, 4]));
}

#[test]
fn failed_recording_submits_nothing() {
    let Some(ctx) = context() else { return };

    let result: Result<(), TransferError> =
        with_scoped_commands(&ctx, QueueRole::Graphics, SubmitMode::Synchronous, |_scope| {
            Err(TransferError::SizeMismatch {
                expected: 1,
                found: 0,
            })
        });
    assert!(matches!(result, Err(TransferError::SizeMismatch { .. })));
}
