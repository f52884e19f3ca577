use super::{Packer, Placement};
use crate::model::{CanvasSize, FreeRect, Rect};

/// Canvas dimension extended by a growth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Axis::Width => Axis::Height,
            Axis::Height => Axis::Width,
        }
    }
}

/// MaxRects free-list packer (best area fit) over a canvas that can grow.
///
/// The free list always covers every unallocated pixel of the canvas; rects
/// contained in another free rect are pruned after each change.
pub struct MaxRectsPacker {
    canvas: CanvasSize,
    free: Vec<FreeRect>,
    used: Vec<Rect>,
    padding: u32,
    grow_width_next: bool,
}

impl MaxRectsPacker {
    pub fn new(canvas: CanvasSize, padding: u32) -> Self {
        let full = Rect::new(0, 0, canvas.width, canvas.height);
        let free = if full.is_empty() { Vec::new() } else { vec![full] };
        Self {
            canvas,
            free,
            used: Vec::new(),
            padding,
            grow_width_next: true,
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn free_rects(&self) -> &[FreeRect] {
        &self.free
    }

    /// Reserved slots (frame plus padding) in placement order.
    pub fn used_rects(&self) -> &[Rect] {
        &self.used
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    fn place_rect(&mut self, node: &Rect) {
        // split all free rectangles that intersect with node
        let mut new_free: Vec<Rect> = Vec::with_capacity(self.free.len() + 4);
        for fr in self.free.iter() {
            if !fr.intersects(node) {
                new_free.push(*fr);
                continue;
            }
            let fr_x2 = fr.right();
            let fr_y2 = fr.bottom();

            let ix1 = fr.x.max(node.x);
            let iy1 = fr.y.max(node.y);
            let ix2 = fr_x2.min(node.right());
            let iy2 = fr_y2.min(node.bottom());

            // above
            if iy1 > fr.y {
                new_free.push(Rect::new(fr.x, fr.y, fr.w, iy1 - fr.y));
            }
            // below
            if iy2 < fr_y2 {
                new_free.push(Rect::new(fr.x, iy2, fr.w, fr_y2 - iy2));
            }
            // left
            if ix1 > fr.x {
                new_free.push(Rect::new(fr.x, fr.y, ix1 - fr.x, fr.h));
            }
            // right
            if ix2 < fr_x2 {
                new_free.push(Rect::new(ix2, fr.y, fr_x2 - ix2, fr.h));
            }
        }

        self.free = new_free;
        self.prune_free_list();
        self.used.push(*node);
    }

    fn prune_free_list(&mut self) {
        self.free.retain(|r| !r.is_empty());
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// (leftover area, leftover short side); lower is better.
    fn score(fr: &Rect, w: u32, h: u32) -> (u64, u32) {
        let leftover_h = fr.w - w;
        let leftover_v = fr.h - h;
        (fr.area() - Rect::new(0, 0, w, h).area(), leftover_h.min(leftover_v))
    }

    fn find_position(&self, w: u32, h: u32, allow_rotation: bool) -> Option<(Rect, bool)> {
        // (area fit, short side fit, y, x, rotated): ties resolve to the top-most,
        // then left-most free rect, then to the unrotated orientation
        let mut best: Option<((u64, u32, u32, u32, bool), Rect)> = None;
        let sw = w.saturating_add(self.padding);
        let sh = h.saturating_add(self.padding);

        for fr in &self.free {
            let mut consider = |slot_w: u32, slot_h: u32, rotated: bool| {
                if fr.w < slot_w || fr.h < slot_h {
                    return;
                }
                let (area_fit, short_fit) = Self::score(fr, slot_w, slot_h);
                let key = (area_fit, short_fit, fr.y, fr.x, rotated);
                if best.as_ref().is_none_or(|(b, _)| key < *b) {
                    best = Some((key, Rect::new(fr.x, fr.y, slot_w, slot_h)));
                }
            };
            consider(sw, sh, false);
            if allow_rotation {
                consider(sh, sw, true);
            }
        }

        best.map(|((.., rotated), slot)| (slot, rotated))
    }

    /// Dimension the next growth step should extend: the smaller one,
    /// alternating between the two while they are equal.
    pub fn next_growth_axis(&mut self) -> Axis {
        if self.canvas.width < self.canvas.height {
            Axis::Width
        } else if self.canvas.height < self.canvas.width {
            Axis::Height
        } else {
            let axis = if self.grow_width_next {
                Axis::Width
            } else {
                Axis::Height
            };
            self.grow_width_next = !self.grow_width_next;
            axis
        }
    }

    /// Extends the canvas by `amount` pixels along `axis`.
    ///
    /// Placed rects stay where they are. Free rects touching the old edge are
    /// stretched into the new area and a strip covering it is added.
    /// The canvas never grows past `u32::MAX` on either axis.
    pub fn grow(&mut self, axis: Axis, amount: u32) {
        let headroom = match axis {
            Axis::Width => u32::MAX - self.canvas.width,
            Axis::Height => u32::MAX - self.canvas.height,
        };
        let amount = amount.min(headroom);
        if amount == 0 {
            return;
        }
        match axis {
            Axis::Width => {
                let old_w = self.canvas.width;
                for fr in self.free.iter_mut() {
                    if fr.right() == old_w {
                        fr.w += amount;
                    }
                }
                self.canvas.width = old_w + amount;
                if self.canvas.height > 0 {
                    self.free
                        .push(Rect::new(old_w, 0, amount, self.canvas.height));
                }
            }
            Axis::Height => {
                let old_h = self.canvas.height;
                for fr in self.free.iter_mut() {
                    if fr.bottom() == old_h {
                        fr.h += amount;
                    }
                }
                self.canvas.height = old_h + amount;
                if self.canvas.width > 0 {
                    self.free
                        .push(Rect::new(0, old_h, self.canvas.width, amount));
                }
            }
        }
        self.prune_free_list();
    }
}

impl Packer for MaxRectsPacker {
    fn can_pack(&self, w: u32, h: u32, allow_rotation: bool) -> bool {
        self.find_position(w, h, allow_rotation).is_some()
    }

    fn pack(&mut self, w: u32, h: u32, allow_rotation: bool) -> Option<Placement> {
        let (slot, rotated) = self.find_position(w, h, allow_rotation)?;
        self.place_rect(&slot);
        Some(Placement {
            x: slot.x,
            y: slot.y,
            rotated,
        })
    }
}
