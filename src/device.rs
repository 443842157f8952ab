// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-flow devices: bounded frame queues between producers and
//! consumers.
//!
//! A device carries frames through two FIFO queues. The *capture* queue
//! holds inbound frames ready for the consumer; the *available* queue is a
//! recycling pool of frame containers the consumer has released back to the
//! producer. Both queues are multi-producer / multi-consumer and are the
//! only cross-thread channels in this crate.
//!
//! Scheduling never blocks: when a producer outruns its consumer and asks
//! for frame dropping, the capture backlog is trimmed to
//! [`MAX_PENDING_FRAMES`] by discarding the oldest frames. Live capture
//! prefers latency over completeness, so overflow is a counted drop rather
//! than backpressure.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::bitmap::{PixelFormat, SharedBitmap};

/// Frame origin: uninitialized.
pub const FRAME_DEFAULT: u32 = 0;

/// Frame origin: belongs to an input device.
pub const FRAME_INPUT: u32 = 1 << 0;

/// Frame origin: belongs to an output device.
pub const FRAME_OUTPUT: u32 = 1 << 1;

/// Frame origin: for local use.
pub const FRAME_LOCAL: u32 = 1 << 2;

/// Soft cap on the capture backlog when frame dropping is requested.
pub const MAX_PENDING_FRAMES: usize = 2;

/// A shared frame: a color bitmap, an optional separate alpha bitmap, and
/// an origin flag word.
#[derive(Debug, Clone, Default)]
pub struct FrameContainer {
    color: Option<SharedBitmap>,
    alpha: Option<SharedBitmap>,
    flags: u32,
}

impl FrameContainer {
    /// Creates a container holding a color bitmap.
    #[must_use]
    pub fn new(color: SharedBitmap, flags: u32) -> Self {
        Self {
            color: Some(color),
            alpha: None,
            flags,
        }
    }

    /// Creates a container holding color and separate alpha bitmaps.
    #[must_use]
    pub fn with_alpha(color: SharedBitmap, alpha: SharedBitmap, flags: u32) -> Self {
        Self {
            color: Some(color),
            alpha: Some(alpha),
            flags,
        }
    }

    /// The color bitmap.
    #[must_use]
    pub fn color(&self) -> Option<&SharedBitmap> {
        self.color.as_ref()
    }

    /// Replaces the color bitmap.
    pub fn set_color(&mut self, color: SharedBitmap) {
        self.color = Some(color);
    }

    /// The separate alpha bitmap, if any.
    #[must_use]
    pub fn alpha(&self) -> Option<&SharedBitmap> {
        self.alpha.as_ref()
    }

    /// Replaces the alpha bitmap.
    pub fn set_alpha(&mut self, alpha: SharedBitmap) {
        self.alpha = Some(alpha);
    }

    /// The origin flag word.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Replaces the origin flag word.
    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
}

/// An unbounded MPMC FIFO of frame containers.
///
/// The queue owns both channel ends, so it never observes disconnection;
/// capacity policy is the caller's business (see
/// [`FrameIo::schedule_input_frame`]).
#[derive(Debug)]
pub struct FrameQueue {
    tx: Sender<FrameContainer>,
    rx: Receiver<FrameContainer>,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Appends a frame.
    pub fn push(&self, frame: FrameContainer) {
        // Cannot fail: the receiver lives in `self`.
        self.tx.send(frame).ok();
    }

    /// Removes and returns the oldest frame, or `None` when empty.
    #[must_use]
    pub fn try_pop(&self) -> Option<FrameContainer> {
        self.rx.try_recv().ok()
    }

    /// Removes and returns the oldest frame, blocking until one arrives.
    #[must_use]
    pub fn wait_pop(&self) -> FrameContainer {
        // Cannot disconnect: the sender lives in `self`.
        self.rx.recv().unwrap_or_default()
    }

    /// Number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` when no frames are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// The queue state shared by every device: name, encoding tag, dropped
/// frame counter, and the capture/available queue pair.
#[derive(Debug)]
pub struct FrameIo {
    name: String,
    encoding: Mutex<PixelFormat>,
    dropped_frames: AtomicU32,
    capture: FrameQueue,
    available: FrameQueue,
}

impl FrameIo {
    /// Creates the device state with the given diagnostic name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            encoding: Mutex::new(PixelFormat::Unknown),
            dropped_frames: AtomicU32::new(0),
            capture: FrameQueue::new(),
            available: FrameQueue::new(),
        }
    }

    /// The device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pixel format this device produces or consumes.
    #[must_use]
    pub fn encoding(&self) -> PixelFormat {
        *self
            .encoding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Tags the device with a pixel format.
    pub fn set_encoding(&self, encoding: PixelFormat) {
        *self
            .encoding
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = encoding;
    }

    /// Frames discarded by the drop-oldest policy so far.
    #[must_use]
    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// The inbound frame queue.
    #[must_use]
    pub fn capture_queue(&self) -> &FrameQueue {
        &self.capture
    }

    /// The recycling pool of released frame containers.
    #[must_use]
    pub fn available_queue(&self) -> &FrameQueue {
        &self.available
    }

    /// Enqueues an inbound frame; never blocks.
    ///
    /// With `drop_frames` set, the capture backlog is trimmed to
    /// [`MAX_PENDING_FRAMES`] by discarding the oldest frames, counting
    /// each discard.
    pub fn schedule_input_frame(&self, frame: FrameContainer, drop_frames: bool) {
        self.capture.push(frame);

        if drop_frames {
            while self.capture.len() > MAX_PENDING_FRAMES {
                if self.capture.try_pop().is_none() {
                    break;
                }
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("device \"{}\" dropping input frame ({dropped} total)", self.name);
            }
        }
    }
}

/// A frame-flow device.
///
/// The queue mechanics are provided; concrete devices supply the state via
/// [`Device::io`] and implement [`Device::schedule_output_frame`] for
/// whatever their output side means (an encoder, a display, a network
/// sink).
pub trait Device: Send + Sync {
    /// The device's queue state.
    fn io(&self) -> &FrameIo;

    /// Hands a frame to the device's output side.
    fn schedule_output_frame(&self, frame: FrameContainer);

    /// Takes the oldest captured frame without blocking.
    fn acquire_input_frame(&self) -> Option<FrameContainer> {
        self.io().capture_queue().try_pop()
    }

    /// Takes the oldest captured frame, blocking until one is available.
    fn acquire_input_frame_blocking(&self) -> FrameContainer {
        self.io().capture_queue().wait_pop()
    }

    /// Returns a consumed frame container to the recycling pool.
    fn release_input_frame(&self, frame: FrameContainer) {
        self.io().available_queue().push(frame);
    }

    /// Takes a recycled frame container from the pool, if any.
    fn acquire_recycled_frame(&self) -> Option<FrameContainer> {
        self.io().available_queue().try_pop()
    }

    /// Enqueues an inbound frame; see [`FrameIo::schedule_input_frame`].
    fn schedule_input_frame(&self, frame: FrameContainer, drop_frames: bool) {
        self.io().schedule_input_frame(frame, drop_frames);
    }

    /// The device name.
    fn name(&self) -> &str {
        self.io().name()
    }

    /// Frames discarded by the drop-oldest policy so far.
    fn dropped_frames(&self) -> u32 {
        self.io().dropped_frames()
    }
}
