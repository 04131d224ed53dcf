//! Character physics on the circular track
//!
//! The character lives on a circle of radius `TRACK_RADIUS` in track space.
//! Angle 0x40 is the bottom of the tube. Inertia, velocities and track-space
//! positions are 8.8 fixed point.
//!
//! - `Normal`: running on the surface, driven by inertia
//! - `Jumping` / `Airborne`: free flight toward the opposite wall, landing
//!   when the character's distance from the centre reaches the radius
//! - hurt: overrides everything with a fixed spin until the timer wraps

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::tables::{atan, cos, sin};
use crate::consts::{SCREEN_CENTER_X, SCREEN_CENTER_Y, TRIG_SHIFT};
use crate::{polar_to_track, wrap_angle};

// === Buttons ===
pub const BUTTON_UP: u8 = 0x01;
pub const BUTTON_DOWN: u8 = 0x02;
pub const BUTTON_LEFT: u8 = 0x04;
pub const BUTTON_RIGHT: u8 = 0x08;
pub const BUTTON_B: u8 = 0x10;
pub const BUTTON_C: u8 = 0x20;
pub const BUTTON_A: u8 = 0x40;
pub const BUTTON_START: u8 = 0x80;
/// Any face button jumps
pub const BUTTON_JUMP: u8 = BUTTON_A | BUTTON_B | BUTTON_C;

// === Movement ===
pub const ACCELERATION: i32 = 0x60;
pub const MAX_INERTIA: i32 = 0x600;
/// Ticks after release before traction takes over
pub const SLIDE_TICKS: u8 = 0x1E;
pub const TRACTION_FACTOR: i32 = 0x50;
/// Below this inertia the character drops off near the seam
pub const SEAM_INERTIA: i32 = 0x100;
/// Inward push when dropping off the seam
pub const SEAM_DROP_SPEED: i32 = 0x200;
pub const TRACK_RADIUS: i32 = 0x68;
/// Track-to-screen scale (8.8; 0x100 = 1:1)
pub const SCREEN_SCALE: i32 = 0x100;

// === Flight ===
pub const JUMP_SPEED: i32 = 0x780;
pub const GRAVITY: i32 = 0xA8;
pub const AIR_CONTROL: i32 = 0x40;
pub const MAX_AIR_SPEED: i32 = 0x600;

// === Animation ===
pub const HURT_STEP: u8 = 8;
pub const ANIM_STEP_TICKS: u8 = 4;
/// Frames between a leader's input and the follower replaying it
pub const HISTORY_LEN: usize = 16;

/// Angle at which a new character is placed
pub const START_ANGLE: u8 = 0x40;

/// Buttons for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// Buttons currently down
    pub held: u8,
    /// Buttons that went down this tick
    pub pressed: u8,
}

impl Controls {
    #[inline]
    pub fn holding(&self, mask: u8) -> bool {
        self.held & mask != 0
    }

    #[inline]
    pub fn just_pressed(&self, mask: u8) -> bool {
        self.pressed & mask != 0
    }
}

/// Countdown service used for post-hit invulnerability
pub trait InvulnerabilityTimer {
    fn start(&mut self, ticks: u32);
    fn tick(&mut self);
    fn is_active(&self) -> bool;
}

/// Plain tick countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownTimer {
    pub remaining: u32,
}

impl InvulnerabilityTimer for CountdownTimer {
    fn start(&mut self, ticks: u32) {
        self.remaining = ticks;
    }

    fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn is_active(&self) -> bool {
        self.remaining > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineState {
    Init,
    Normal,
    Jumping,
    Airborne,
}

/// Art sets used by the running character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimClip {
    Upright,
    Diagonal,
    Sideways,
}

/// Clip and flips for one octant or hurt step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pose {
    clip: AnimClip,
    hflip: bool,
    vflip: bool,
}

const fn pose(clip: AnimClip, hflip: bool, vflip: bool) -> Pose {
    Pose { clip, hflip, vflip }
}

/// Octant `(angle + 16) >> 5` to pose; octant 2 is the tube floor
const OCTANT_POSES: [Pose; 8] = [
    pose(AnimClip::Sideways, true, false),
    pose(AnimClip::Diagonal, true, false),
    pose(AnimClip::Upright, false, false),
    pose(AnimClip::Diagonal, false, false),
    pose(AnimClip::Sideways, false, false),
    pose(AnimClip::Diagonal, false, true),
    pose(AnimClip::Upright, false, true),
    pose(AnimClip::Diagonal, true, true),
];

/// Octants whose entry restarts the upright flip cycle
const FLIP_RESET_OCTANTS: [u8; 2] = [2, 6];

/// Spin while hurt, keyed by `(timer + angle - 16) >> 5`
const HURT_POSES: [(u8, Pose); 8] = [
    (0, pose(AnimClip::Sideways, true, false)),
    (1, pose(AnimClip::Diagonal, true, false)),
    (2, pose(AnimClip::Upright, false, false)),
    (1, pose(AnimClip::Diagonal, false, false)),
    (0, pose(AnimClip::Sideways, false, false)),
    (1, pose(AnimClip::Diagonal, false, true)),
    (2, pose(AnimClip::Upright, false, true)),
    (1, pose(AnimClip::Diagonal, true, true)),
];

/// What the renderer needs for one character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub screen: IVec2,
    pub clip: AnimClip,
    pub frame: u8,
    pub hflip: bool,
    pub vflip: bool,
    pub hurt: bool,
    pub invulnerable: bool,
}

/// One character on the track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub routine: RoutineState,
    pub hurt: bool,
    pub hurt_timer: u8,
    /// Track angle (0-255)
    pub angle: u8,
    /// Angular speed, 8.8
    pub inertia: i32,
    pub slide_timer: u8,
    /// Distance from the tube centre while on the track
    pub z_depth: i32,
    /// Track-space position, 8.8
    pub position: IVec2,
    /// Flight velocity, 8.8
    pub velocity: IVec2,
    pub screen: IVec2,

    // Animation
    pub clip: AnimClip,
    pub anim_frame: u8,
    pub anim_timer: u8,
    /// Upright cycle: 0-7, second half drawn mirrored
    pub flip_timer: u8,
    pub hflip: bool,
    pub vflip: bool,
    last_octant: u8,

    history: [Controls; HISTORY_LEN],
    history_pos: usize,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            routine: RoutineState::Init,
            hurt: false,
            hurt_timer: 0,
            angle: START_ANGLE,
            inertia: 0,
            slide_timer: 0,
            z_depth: TRACK_RADIUS,
            position: IVec2::ZERO,
            velocity: IVec2::ZERO,
            screen: IVec2::new(SCREEN_CENTER_X, SCREEN_CENTER_Y),
            clip: AnimClip::Upright,
            anim_frame: 0,
            anim_timer: 0,
            flip_timer: 0,
            hflip: false,
            vflip: false,
            last_octant: octant(START_ANGLE),
            history: [Controls::default(); HISTORY_LEN],
            history_pos: 0,
        }
    }

    /// Running on the surface (the only time objects can be touched)
    pub fn on_track(&self) -> bool {
        self.routine == RoutineState::Normal
    }

    /// Remember this tick's controls for a follower
    pub fn record_controls(&mut self, controls: Controls) {
        self.history[self.history_pos] = controls;
        self.history_pos = (self.history_pos + 1) % HISTORY_LEN;
    }

    /// Controls recorded `HISTORY_LEN` ticks ago (read before recording)
    pub fn delayed_controls(&self) -> Controls {
        self.history[self.history_pos]
    }

    /// Start the hurt spin
    pub fn hurt(&mut self) {
        if self.hurt {
            return;
        }
        self.hurt = true;
        self.hurt_timer = 0;
        self.inertia = 0;
    }

    /// Advance one tick
    pub fn update<T: InvulnerabilityTimer>(
        &mut self,
        controls: Controls,
        invulnerability: &mut T,
        invulnerability_ticks: u32,
    ) {
        invulnerability.tick();

        if self.routine == RoutineState::Init {
            self.angle = START_ANGLE;
            self.z_depth = TRACK_RADIUS;
            self.update_track_position();
            self.routine = RoutineState::Normal;
        }

        if self.hurt {
            self.update_hurt(invulnerability, invulnerability_ticks);
            self.project_to_screen();
            return;
        }

        match self.routine {
            RoutineState::Init | RoutineState::Normal => self.update_normal(controls),
            RoutineState::Jumping | RoutineState::Airborne => self.update_flight(controls),
        }
        self.project_to_screen();
        self.update_animation();
    }

    fn update_normal(&mut self, controls: Controls) {
        let left = controls.holding(BUTTON_LEFT);
        let right = controls.holding(BUTTON_RIGHT);
        if left || right {
            if left {
                self.inertia += ACCELERATION;
            }
            if right {
                self.inertia -= ACCELERATION;
            }
            self.inertia = self.inertia.clamp(-MAX_INERTIA, MAX_INERTIA);
            self.slide_timer = SLIDE_TICKS;
        } else {
            self.inertia -= self.inertia >> 3;
            if self.slide_timer > 0 {
                self.slide_timer -= 1;
            } else {
                self.inertia += (cos(self.angle) as i32 * TRACTION_FACTOR) >> TRIG_SHIFT;
                if self.near_seam() {
                    let inward = self.angle.wrapping_add(0x80);
                    let velocity = IVec2::new(
                        (cos(inward) as i32 * SEAM_DROP_SPEED) >> TRIG_SHIFT,
                        (sin(inward) as i32 * SEAM_DROP_SPEED) >> TRIG_SHIFT,
                    );
                    self.leave_track(RoutineState::Airborne, velocity);
                    return;
                }
            }
        }

        self.angle = wrap_angle(self.angle as i32 + (self.inertia >> 8));
        self.update_track_position();

        if controls.just_pressed(BUTTON_JUMP) {
            let away = self.angle.wrapping_add(0x80);
            let velocity = IVec2::new(
                (cos(away) as i32 * JUMP_SPEED) >> TRIG_SHIFT,
                (sin(away) as i32 * JUMP_SPEED) >> TRIG_SHIFT,
            );
            self.leave_track(RoutineState::Jumping, velocity);
        }
    }

    fn near_seam(&self) -> bool {
        let band = self.angle.wrapping_add(4);
        (0x80..0x88).contains(&band) && self.inertia.abs() < SEAM_INERTIA
    }

    fn leave_track(&mut self, routine: RoutineState, velocity: IVec2) {
        log::debug!("leaving track at angle {:#x} ({:?})", self.angle, routine);
        self.routine = routine;
        self.velocity = velocity;
        self.inertia = 0;
    }

    fn update_flight(&mut self, controls: Controls) {
        if controls.holding(BUTTON_LEFT) {
            self.velocity.x -= AIR_CONTROL;
        }
        if controls.holding(BUTTON_RIGHT) {
            self.velocity.x += AIR_CONTROL;
        }
        self.velocity.x = self.velocity.x.clamp(-MAX_AIR_SPEED, MAX_AIR_SPEED);

        // Move with last frame's vertical speed; gravity shows up next frame
        self.position += self.velocity;
        self.velocity.y += GRAVITY;

        let x = self.position.x >> 8;
        let y = self.position.y >> 8;
        self.angle = atan(x, y);
        // Only touch down while heading out towards the surface
        let outward = self.position.x as i64 * self.velocity.x as i64
            + self.position.y as i64 * self.velocity.y as i64;
        if outward > 0 && x * x + y * y >= self.z_depth * self.z_depth {
            self.land();
        }
    }

    fn land(&mut self) {
        self.routine = RoutineState::Normal;
        self.velocity = IVec2::ZERO;
        self.inertia = 0;
        self.update_track_position();
    }

    fn update_hurt<T: InvulnerabilityTimer>(&mut self, invulnerability: &mut T, ticks: u32) {
        self.hurt_timer = self.hurt_timer.wrapping_add(HURT_STEP);
        let key = self
            .hurt_timer
            .wrapping_add(self.angle)
            .wrapping_sub(16)
            >> 5;
        let (frame, pose) = HURT_POSES[key as usize];
        self.set_pose(pose);
        self.anim_frame = frame;

        if self.hurt_timer == 0 {
            self.hurt = false;
            invulnerability.start(ticks);
            log::debug!("hurt over, invulnerable for {} ticks", ticks);
        }
    }

    fn update_track_position(&mut self) {
        self.position = polar_to_track(self.angle, self.z_depth << 8);
    }

    fn project_to_screen(&mut self) {
        let scaled = ((self.position >> 8) * SCREEN_SCALE) >> 8;
        self.screen = IVec2::new(SCREEN_CENTER_X, SCREEN_CENTER_Y) + scaled;
    }

    fn set_pose(&mut self, pose: Pose) {
        self.clip = pose.clip;
        self.hflip = pose.hflip;
        self.vflip = pose.vflip;
    }

    fn update_animation(&mut self) {
        let current = octant(self.angle);
        if current != self.last_octant && FLIP_RESET_OCTANTS.contains(&current) {
            self.flip_timer = 0;
        }
        self.last_octant = current;

        self.anim_timer += 1;
        if self.anim_timer >= ANIM_STEP_TICKS {
            self.anim_timer = 0;
            self.flip_timer = (self.flip_timer + 1) & 7;
        }

        let pose = OCTANT_POSES[current as usize];
        self.set_pose(pose);
        self.anim_frame = self.flip_timer & 3;
        if pose.clip == AnimClip::Upright && self.flip_timer >= 4 {
            self.hflip = !self.hflip;
        }
    }

    pub fn view<T: InvulnerabilityTimer>(&self, invulnerability: &T) -> PlayerView {
        PlayerView {
            screen: self.screen,
            clip: self.clip,
            frame: self.anim_frame,
            hflip: self.hflip,
            vflip: self.vflip,
            hurt: self.hurt,
            invulnerable: invulnerability.is_active(),
        }
    }
}

#[inline]
fn octant(angle: u8) -> u8 {
    angle.wrapping_add(16) >> 5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(mask: u8) -> Controls {
        Controls {
            held: mask,
            pressed: 0,
        }
    }

    fn press(mask: u8) -> Controls {
        Controls {
            held: mask,
            pressed: mask,
        }
    }

    fn run(player: &mut Player, controls: Controls, ticks: u32) -> CountdownTimer {
        let mut timer = CountdownTimer::default();
        for _ in 0..ticks {
            player.update(controls, &mut timer, 120);
        }
        timer
    }

    #[test]
    fn test_holding_left_caps_inertia() {
        let mut player = Player::new();
        run(&mut player, hold(BUTTON_LEFT), 20);
        assert_eq!(player.inertia, (20 * ACCELERATION).min(MAX_INERTIA));
        assert_eq!(player.inertia, 0x600);
    }

    #[test]
    fn test_inertia_below_cap() {
        let mut player = Player::new();
        run(&mut player, hold(BUTTON_RIGHT), 5);
        assert_eq!(player.inertia, -5 * ACCELERATION);
    }

    #[test]
    fn test_init_places_character_at_bottom() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        assert_eq!(player.routine, RoutineState::Normal);
        assert_eq!(player.angle, START_ANGLE);
        assert_eq!(player.screen, IVec2::new(0x80, 0x70 + TRACK_RADIUS));
        assert_eq!(player.clip, AnimClip::Upright);
    }

    #[test]
    fn test_friction_then_traction_recentres() {
        let mut player = Player::new();
        run(&mut player, hold(BUTTON_LEFT), 10);
        let angle_after_run = player.angle;
        assert!(angle_after_run > START_ANGLE);
        run(&mut player, Controls::default(), SLIDE_TICKS as u32);
        assert_eq!(player.slide_timer, 0);
        // Friction alone while sliding
        assert!(player.inertia.abs() < 0x100);
        // Traction now pulls back toward the floor
        run(&mut player, Controls::default(), 1);
        assert!(player.inertia < 0);
    }

    #[test]
    fn test_seam_drops_character() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        player.angle = 0x7D;
        player.update_track_position();
        player.inertia = 0;
        player.slide_timer = 0;
        run(&mut player, Controls::default(), 1);
        assert_eq!(player.routine, RoutineState::Airborne);
        assert!(player.velocity.x > 0, "pushed in towards the centre");

        // Falls clear of the seam band and lands lower down the wall
        let mut landed = false;
        for _ in 0..60 {
            run(&mut player, Controls::default(), 1);
            if player.routine == RoutineState::Normal {
                landed = true;
                break;
            }
        }
        assert!(landed);
        let band = player.angle.wrapping_add(4);
        assert!(!(0x80..0x88).contains(&band), "landed at {:#x}", player.angle);
        assert!(player.angle > 0x40 && player.angle < 0x7C);
    }

    #[test]
    fn test_seam_drop_does_not_flicker() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        player.angle = 0x7D;
        player.update_track_position();
        player.inertia = 0;
        player.slide_timer = 0;

        let mut landings = 0;
        let mut previous = player.routine;
        for _ in 0..40 {
            run(&mut player, Controls::default(), 1);
            if previous != RoutineState::Normal && player.routine == RoutineState::Normal {
                landings += 1;
            }
            previous = player.routine;
        }
        assert_eq!(landings, 1);
    }

    #[test]
    fn test_jump_from_floor_lands() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        run(&mut player, press(BUTTON_A), 1);
        assert_eq!(player.routine, RoutineState::Jumping);
        // Straight up from the floor
        assert_eq!(player.velocity, IVec2::new(0, -JUMP_SPEED));

        let mut landed = false;
        for _ in 0..200 {
            run(&mut player, Controls::default(), 1);
            if player.routine == RoutineState::Normal {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(player.velocity, IVec2::ZERO);
        assert_eq!(player.inertia, 0);
    }

    #[test]
    fn test_gravity_applies_next_frame() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        run(&mut player, press(BUTTON_A), 1);
        let before = player.position;
        run(&mut player, Controls::default(), 1);
        assert_eq!(player.position.y - before.y, -JUMP_SPEED);
        assert_eq!(player.velocity.y, -JUMP_SPEED + GRAVITY);
    }

    #[test]
    fn test_air_control_is_clamped() {
        let mut player = Player::new();
        player.routine = RoutineState::Airborne;
        player.velocity = IVec2::new(MAX_AIR_SPEED - 0x10, -0x800);
        player.update(hold(BUTTON_RIGHT), &mut CountdownTimer::default(), 0);
        assert_eq!(player.velocity.x, MAX_AIR_SPEED);
    }

    #[test]
    fn test_hurt_spins_then_invulnerable() {
        let mut player = Player::new();
        run(&mut player, Controls::default(), 1);
        player.hurt();
        let mut timer = CountdownTimer::default();
        for tick in 1..=32 {
            player.update(Controls::default(), &mut timer, 120);
            assert_eq!(player.hurt, tick < 32, "tick {tick}");
        }
        assert!(timer.is_active());
        assert_eq!(timer.remaining, 120);
        run(&mut player, Controls::default(), 1);
        assert!(!player.hurt);
    }

    #[test]
    fn test_upright_flip_cycle() {
        let mut player = Player::new();
        let mut timer = CountdownTimer::default();
        let mut flips = Vec::new();
        for _ in 0..32 {
            player.update(Controls::default(), &mut timer, 0);
            flips.push(player.hflip);
        }
        // Flip timer steps every 4 ticks; its second half is mirrored
        assert!(flips[..15].iter().all(|f| !f));
        assert!(flips[15..31].iter().all(|f| *f));
        assert!(!flips[31]);
    }

    #[test]
    fn test_octant_poses() {
        assert_eq!(octant(0x40), 2);
        assert_eq!(octant(0x30), 2);
        assert_eq!(octant(0x2F), 1);
        assert_eq!(octant(0xF0), 0);
        assert_eq!(OCTANT_POSES[6].clip, AnimClip::Upright);
        assert!(OCTANT_POSES[6].vflip);
    }

    #[test]
    fn test_control_history_delay() {
        let mut leader = Player::new();
        for i in 0..40u8 {
            let delayed = leader.delayed_controls();
            if i >= HISTORY_LEN as u8 {
                assert_eq!(delayed.held, i - HISTORY_LEN as u8);
            } else {
                assert_eq!(delayed, Controls::default());
            }
            leader.record_controls(Controls { held: i, pressed: 0 });
        }
    }

    #[test]
    fn test_angle_closed_over_wrap() {
        let mut player = Player::new();
        for _ in 0..600 {
            run(&mut player, hold(BUTTON_LEFT), 1);
            assert!(player.position.x.abs() <= 256 * TRACK_RADIUS);
        }
    }
}
