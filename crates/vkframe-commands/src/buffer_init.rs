use vkframe::{
    allocator::{Allocator, MemoryUsage},
    ash::vk,
    context::{Ctx, QueueRole},
    resources::{BufDesc, Buffer, BufferMapError},
};

use crate::{ScopedCommands, SubmitMode, TransferError};

fn check_range(buffer: &Buffer, offset: u64, size: u64) -> Result<(), BufferMapError> {
    match offset.checked_add(size) {
        Some(end) if end <= buffer.size() => Ok(()),
        _ => Err(BufferMapError::OutOfBounds {
            offset,
            size,
            buffer_size: buffer.size(),
        }),
    }
}

///Copies `data` into `target` at `offset` through a staging buffer. Returns once the copy has finished on the graphics
/// queue.
///
/// `target` needs `TRANSFER_DST` usage. Fails without touching the device if the data does not fit.
pub fn upload_buffer<A: Allocator + Send + Sync + 'static>(
    ctx: &Ctx<A>,
    target: &Buffer,
    offset: u64,
    data: &[u8],
) -> Result<(), TransferError> {
    check_range(target, offset, data.len() as u64)?;
    if data.is_empty() {
        return Ok(());
    }

    let staging =
        Buffer::new_staging_for_data(&ctx.device, &ctx.allocator, Some("StagingBuffer"), data)?;

    let mut scope = ScopedCommands::new(ctx, QueueRole::Graphics, SubmitMode::Synchronous)?;
    let (src, dst) = (staging.inner, target.inner);
    scope.record(|device, cb| unsafe {
        device.cmd_copy_buffer(
            cb,
            src,
            dst,
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: offset,
                size: data.len() as u64,
            }],
        )
    });
    scope.keep_alive(staging);
    scope.submit()?;

    #[cfg(feature = "logging")]
    log::trace!("Uploaded {} bytes to buffer {:?}", data.len(), dst);

    Ok(())
}

///Creates a Gpu exclusive buffer filled with `data`. `TRANSFER_DST` is added to `usage`.
///Returns when the buffer has finished uploading.
pub fn buffer_from_data<A: Allocator + Send + Sync + 'static, T: bytemuck::Pod>(
    ctx: &Ctx<A>,
    usage: vk::BufferUsageFlags,
    name: Option<&str>,
    data: &[T],
) -> Result<Buffer, TransferError> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let buffer = Buffer::new(
        &ctx.device,
        &ctx.allocator,
        //zero sized buffers are invalid.
        BufDesc::new(
            (bytes.len() as u64).max(1),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
        ),
        MemoryUsage::GpuOnly,
        name,
    )?;

    upload_buffer(ctx, &buffer, 0, bytes)?;
    Ok(buffer)
}

///Reads `dst.len()` bytes starting at `offset` of `src` back to the host. `src` needs `TRANSFER_SRC` usage.
///
/// Blocks until the graphics queue finished the copy into a host visible readback buffer.
pub fn download_buffer<A: Allocator + Send + Sync + 'static>(
    ctx: &Ctx<A>,
    src: &Buffer,
    offset: u64,
    dst: &mut [u8],
) -> Result<(), TransferError> {
    check_range(src, offset, dst.len() as u64)?;
    if dst.is_empty() {
        return Ok(());
    }

    let mut readback = Buffer::new(
        &ctx.device,
        &ctx.allocator,
        BufDesc::new(dst.len() as u64, vk::BufferUsageFlags::TRANSFER_DST),
        MemoryUsage::GpuToCpu,
        Some("ReadbackBuffer"),
    )?;

    let mut scope = ScopedCommands::new(ctx, QueueRole::Graphics, SubmitMode::Synchronous)?;
    let (src_hdl, dst_hdl, size) = (src.inner, readback.inner, dst.len() as u64);
    scope.record(|device, cb| unsafe {
        device.cmd_copy_buffer(
            cb,
            src_hdl,
            dst_hdl,
            &[vk::BufferCopy {
                src_offset: offset,
                dst_offset: 0,
                size,
            }],
        );
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
    scope.submit()?;

    readback.read(0, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;
    use vkframe::resources::Buffer;

    use crate::ScopedCommands;

    #[test]
    fn scope_resources_send() {
        //Staging buffers are moved into the scope's keep alive list.
        assert_impl_all!(Buffer: Send, Sync);
        assert_impl_all!(ScopedCommands: Send);
    }
}
