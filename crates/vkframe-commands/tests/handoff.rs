mod common;

use vkframe::{
    allocator::MemoryUsage,
    ash::vk,
    context::QueueRole,
    resources::CommandBufferAllocator,
    sync::{BarrierBuilder, DEFAULT_FENCE_TIMEOUT, Fence},
};
use vkframe_commands::handoff::{BufferAccess, Handoff};

use common::context;

const SIZE: u64 = 64 * 1024;
const PATTERN: u32 = 0xdead_beef;

#[test]
fn compute_then_graphics() {
    let Some(ctx) = context() else { return };
    let device = &ctx.device.inner;

    let mut handoff =
        Handoff::new(&ctx, QueueRole::Compute, QueueRole::Graphics).expect("handoff");
    let shared = ctx
        .create_buffer(
            SIZE,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryUsage::GpuOnly,
            Some("Shared"),
        )
        .expect("shared buffer");
    let mut readback = ctx
        .create_buffer(
            SIZE,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryUsage::GpuToCpu,
            Some("Readback"),
        )
        .expect("readback buffer");

    let transfer = handoff.buffer(
        &shared,
        BufferAccess::TRANSFER_WRITE,
        BufferAccess::TRANSFER_READ,
    );
    assert_eq!(transfer.value(), 1);

    let mut producer = ctx
        .pool(QueueRole::Compute)
        .expect("compute pool")
        .clone()
        .allocate_buffer(vk::CommandBufferLevel::PRIMARY)
        .expect("producer");
    producer
        .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        .expect("begin");
    unsafe { device.cmd_fill_buffer(producer.inner, shared.inner, 0, vk::WHOLE_SIZE, PATTERN) };
    transfer.record_release(device, producer.inner);
    producer.end().expect("end");

    let mut consumer = ctx
        .pool(QueueRole::Graphics)
        .expect("graphics pool")
        .clone()
        .allocate_buffer(vk::CommandBufferLevel::PRIMARY)
        .expect("consumer");
    consumer
        .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        .expect("begin");
    transfer.record_acquire(device, consumer.inner);
    if handoff.is_same_queue() {
        //Submission order alone does not make the fill visible to the copy.
        BarrierBuilder::new()
            .buffer_barrier(
                shared.inner,
                0,
                vk::WHOLE_SIZE,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::PipelineStageFlags2::TRANSFER,
                vk::QUEUE_FAMILY_IGNORED,
                vk::AccessFlags2::TRANSFER_READ,
                vk::PipelineStageFlags2::TRANSFER,
                vk::QUEUE_FAMILY_IGNORED,
            )
            .record(device, consumer.inner);
    }
    unsafe {
        device.cmd_copy_buffer(
            consumer.inner,
            shared.inner,
            readback.inner,
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: SIZE,
            }],
        );
        let host_read = [vk::MemoryBarrier2::default()
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .dst_access_mask(vk::AccessFlags2::HOST_READ)
            .dst_stage_mask(vk::PipelineStageFlags2::HOST)];
        device.cmd_pipeline_barrier2(
            consumer.inner,
            &vk::DependencyInfo::default().memory_barriers(&host_read),
        );
    };
    consumer.end().expect("end");

    let done = Fence::new(&ctx.device, false).expect("fence");
    let signals = transfer.signal_info().into_iter().collect::<Vec<_>>();
    let waits = transfer.wait_info().into_iter().collect::<Vec<_>>();
    let submit_producer = || {
        ctx.queue(QueueRole::Compute).submit(
            device,
            &[producer.inner],
            &[],
            &signals,
            vk::Fence::null(),
        )
    };
    let submit_consumer = || {
        ctx.queue(QueueRole::Graphics)
            .submit(device, &[consumer.inner], &waits, &[], done.inner)
    };

    if handoff.is_same_queue() {
        submit_producer().expect("producer submit");
        submit_consumer().expect("consumer submit");
    } else {
        //The consumer goes first. Only the semaphore wait keeps it from reading early.
        submit_consumer().expect("consumer submit");
        submit_producer().expect("producer submit");
    }

    done.wait(DEFAULT_FENCE_TIMEOUT).expect("consumer finished");
    ctx.device.wait_idle().expect("idle");

    if !handoff.is_same_queue() {
        assert!(handoff.semaphore().get_value().expect("value") >= transfer.value());
    }

    let mut bytes = vec![0u8; SIZE as usize];
    readback.read(0, &mut bytes).expect("read");
    assert!(
        bytes
            .chunks_exact(4)
            .all(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]) == PATTERN),
        "consumer read the buffer before the producer filled it"
    );
}

#[test]
fn values_advance_per_transfer() {
    let Some(ctx) = context() else { return };
    let buffer = ctx
        .create_buffer(
            4,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryUsage::GpuOnly,
            None,
        )
        .expect("buffer");

    let mut handoff =
        Handoff::new(&ctx, QueueRole::Compute, QueueRole::Graphics).expect("handoff");
    let values = (0..3)
        .map(|_| {
            handoff
                .buffer(&buffer, BufferAccess::COMPUTE_WRITE, BufferAccess::VERTEX_READ)
                .value()
        })
        .collect::<Vec<_>>();
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(handoff.value(), 3);
}
