// End-to-end scenarios for the navigation pipeline.
//
// Each test builds a small level in code with `LevelBuilder`, runs the full
// `build_navigation()` pipeline with the vanilla preset (radius 16, height
// 56, 16-unit lattice), and checks the grid, the mesh and A* results
// against hand-computed expectations.

use doompath_nav::area::Compactor;
use doompath_nav::config::NavConfig;
use doompath_nav::grid::GridBuilder;
use doompath_nav::level::{LevelGeometry, Sector, TeleportDestination};
use doompath_nav::level_map::{LevelBuilder, LevelMap};
use doompath_nav::mesh::{Mesh, NavBuild, build_navigation};
use doompath_nav::pathfinding::Pathfinder;
use doompath_nav::types::{AreaId, ConnectionFlags, Direction, ElementFlags, WorldPos};
use doompath_nav::{Diagnostic, geometry::WorldRect};

/// Kind used for teleport landing spots; has no collision dimensions.
const TELEPORT_DEST: u16 = 14;

fn flat_room() -> LevelMap {
    let mut builder = LevelBuilder::new();
    let room = builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
    builder.add_box_walls(0.0, 0.0, 256.0, 256.0, room);
    builder.add_thing_at(1, 128.0, 128.0);
    builder.build().unwrap()
}

/// Two 256x256 rooms side by side, joined by a 64-unit doorway in the
/// dividing wall at x = 256 (y 96..160). The second room's floor deals
/// `damage` per tic.
fn doorway_rooms(damage: i32) -> LevelMap {
    let mut builder = LevelBuilder::new();
    let a = builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
    let mut hall = Sector::flat(0.0, 128.0);
    hall.damage = damage;
    let b = builder.add_room(256.0, 0.0, 512.0, 256.0, hall);
    builder.add_box_walls(0.0, 0.0, 512.0, 256.0, a);
    builder.add_wall((256.0, 0.0), (256.0, 96.0), a);
    builder.add_portal((256.0, 96.0), (256.0, 160.0), a, b);
    builder.add_wall((256.0, 160.0), (256.0, 256.0), a);
    builder.add_thing_at(1, 128.0, 128.0);
    builder.build().unwrap()
}

/// Two walled rooms far apart. A two-sided trigger line in the middle of
/// the first teleports to a landing spot in the second.
fn teleport_rooms() -> LevelMap {
    let mut builder = LevelBuilder::new();
    let a = builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
    let b = builder.add_room(1024.0, 0.0, 1280.0, 256.0, Sector::flat(0.0, 128.0));
    builder.add_box_walls(0.0, 0.0, 256.0, 256.0, a);
    builder.add_box_walls(1024.0, 0.0, 1280.0, 256.0, b);
    let trigger = builder.add_portal((128.0, 64.0), (128.0, 192.0), a, a);
    let landing = builder.add_thing_at(TELEPORT_DEST, 1152.0, 128.0);
    builder.add_teleporter(trigger, TeleportDestination::Thing(landing));
    builder.add_thing_at(1, 64.0, 128.0);
    builder.build().unwrap()
}

fn build(level: &LevelMap) -> NavBuild {
    build_navigation(level, &NavConfig::doom()).unwrap()
}

fn area_of(mesh: &Mesh, x: f64, y: f64) -> AreaId {
    mesh.area_at(x, y, 0.0).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn flat_room_is_one_area() {
    let build = build(&flat_room());

    assert!(build.diagnostics.is_empty());
    assert_eq!(build.grid.len(), 14 * 14);
    assert!(build.grid.links_are_mutual());
    assert_eq!(build.grid.stats.one_way_links_removed, 0);

    let areas = build.mesh.areas();
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].world, WorldRect::new(16.0, 16.0, 240.0, 240.0));
    assert_eq!(areas[0].elements.len(), 14 * 14);
    assert!(build.mesh.connections().is_empty());
}

#[test]
fn doorway_area_has_one_bidirectional_portal_per_side() {
    let build = build(&doorway_rooms(0));
    let mesh = &build.mesh;

    // The cells straddling the wall line form their own area.
    assert_eq!(mesh.areas().len(), 3);
    let room_a = area_of(mesh, 128.0, 128.0);
    let room_b = area_of(mesh, 384.0, 128.0);
    let doorway = area_of(mesh, 256.0, 128.0);
    assert_eq!(
        mesh.area(doorway).world,
        WorldRect::new(240.0, 112.0, 272.0, 144.0)
    );

    assert_eq!(mesh.connections().len(), 2);
    for (room, x) in [(room_a, 240.0), (room_b, 272.0)] {
        let portals: Vec<_> = mesh
            .connections()
            .iter()
            .filter(|c| c.area_a == room || c.area_b == room)
            .collect();
        assert_eq!(portals.len(), 1);
        let portal = portals[0];
        assert!(portal.area_a == doorway || portal.area_b == doorway);
        assert_eq!(portal.flags, ConnectionFlags::AB | ConnectionFlags::BA);
        // 64-unit opening less one capsule radius of clearance on each side.
        assert_eq!(portal.rect, WorldRect::new(x, 112.0, x, 144.0));
        assert_eq!(portal.rect.height(), 64.0 - 2.0 * 16.0);
    }

    let path = Pathfinder::new(mesh, &NavConfig::doom())
        .find(WorldPos::new(128.0, 128.0, 0.0), WorldPos::new(384.0, 128.0, 0.0))
        .unwrap();
    assert_eq!(path.areas.first(), Some(&room_a));
    assert_eq!(path.areas.last(), Some(&room_b));
    // Room -> doorway center at x = 240 -> far side of the doorway at x = 272.
    assert_eq!(path.cost, 112.0 + 32.0);
}

#[test]
fn teleport_is_one_way_and_free() {
    let build = build(&teleport_rooms());
    let mesh = &build.mesh;
    assert!(build.diagnostics.is_empty());

    let room_a = area_of(mesh, 64.0, 128.0);
    let room_b = area_of(mesh, 1152.0, 128.0);
    assert_eq!(mesh.connections().len(), 1);
    let teleport = &mesh.connections()[0];
    assert_eq!(teleport.flags, ConnectionFlags::AB | ConnectionFlags::TELEPORT);
    assert_eq!(teleport.area_a, room_a);
    assert_eq!(teleport.area_b, room_b);
    assert!(teleport.source_edge.is_some());

    let cfg = NavConfig::doom();
    let finder = Pathfinder::new(mesh, &cfg);
    let there = finder
        .find(WorldPos::new(64.0, 128.0, 0.0), WorldPos::new(1152.0, 128.0, 0.0))
        .unwrap();
    assert_eq!(there.connections.len(), 1);
    assert_eq!(there.cost, 0.0);

    let back = finder.find(WorldPos::new(1152.0, 128.0, 0.0), WorldPos::new(64.0, 128.0, 0.0));
    assert!(back.is_none());
}

#[test]
fn hazard_room_doubles_entry_cost() {
    let safe = build(&doorway_rooms(0));
    let hurt = build(&doorway_rooms(5));

    let room_b = area_of(&hurt.mesh, 384.0, 128.0);
    assert_eq!(hurt.mesh.area(room_b).flags, ElementFlags::DAMAGE_LOW);

    let config = NavConfig::doom();
    let start = WorldPos::new(128.0, 128.0, 0.0);
    let end = WorldPos::new(384.0, 128.0, 0.0);
    let safe_path = Pathfinder::new(&safe.mesh, &config).find(start, end).unwrap();
    let hurt_path = Pathfinder::new(&hurt.mesh, &config).find(start, end).unwrap();

    // Every hop past room A lands on the damaging floor.
    assert_eq!(hurt_path.areas.len(), safe_path.areas.len());
    assert_eq!(hurt_path.cost, 2.0 * safe_path.cost);
}

#[test]
fn points_outside_every_area_find_nothing() {
    let build = build(&flat_room());
    let cfg = NavConfig::doom();
    let finder = Pathfinder::new(&build.mesh, &cfg);
    let inside = WorldPos::new(128.0, 128.0, 0.0);
    // Hugging the wall, closer than a capsule radius.
    let against_wall = WorldPos::new(4.0, 128.0, 0.0);
    let beyond = WorldPos::new(900.0, 900.0, 0.0);

    assert!(finder.find(inside, against_wall).is_none());
    assert!(finder.find(beyond, inside).is_none());
}

#[test]
fn blocked_spawn_becomes_a_diagnostic() {
    let mut builder = LevelBuilder::new();
    let room = builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
    builder.add_box_walls(0.0, 0.0, 256.0, 256.0, room);
    builder.add_thing_at(1, 128.0, 128.0);
    builder.add_thing_at(2, 4.0, 4.0);
    let level = builder.build().unwrap();

    let build = build(&level);
    assert_eq!(build.mesh.areas().len(), 1);
    assert!(matches!(
        build.diagnostics.as_slice(),
        [Diagnostic::SpawnBlocked { .. }]
    ));
}

#[test]
fn teleport_into_nowhere_is_reported() {
    let mut builder = LevelBuilder::new();
    let room = builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
    builder.add_box_walls(0.0, 0.0, 256.0, 256.0, room);
    let trigger = builder.add_portal((128.0, 64.0), (128.0, 192.0), room, room);
    builder.add_thing_at(1, 64.0, 128.0);
    // Landing spot inside a wall: no room to stand there.
    let landing = builder.add_thing_at(TELEPORT_DEST, 2.0, 2.0);
    builder.add_teleporter(trigger, TeleportDestination::Thing(landing));
    let level = builder.build().unwrap();

    let build = build(&level);
    assert!(build.mesh.connections().is_empty());
    assert!(
        build
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::TeleportDestinationBlocked { .. }))
    );
    assert!(
        build
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::TeleportWithoutArea { .. }))
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn links_are_symmetric() {
    for level in [flat_room(), doorway_rooms(0), doorway_rooms(5), teleport_rooms()] {
        let grid = build(&level).grid;
        for id in grid.ids() {
            for dir in Direction::ALL {
                if let Some(other) = grid.element(id).neighbor(dir) {
                    assert_eq!(grid.element(other).neighbor(dir.opposite()), Some(id));
                }
            }
        }
    }
}

#[test]
fn area_members_are_similar_and_cover_the_grid() {
    for level in [flat_room(), doorway_rooms(0), doorway_rooms(5), teleport_rooms()] {
        let build = build(&level);
        let mut covered = 0;
        for area in build.mesh.areas() {
            let representative = build.grid.element(area.representative().unwrap());
            for &member in &area.elements {
                let element = build.grid.element(member);
                assert!(element.is_similar(representative));
                assert!(area.rect.contains(element.x, element.y));
            }
            assert_eq!(area.elements.len(), area.rect.cell_count());
            covered += area.elements.len();
        }
        assert_eq!(covered, build.grid.len());
    }
}

#[test]
fn merging_reaches_a_fixpoint() {
    let level = doorway_rooms(5);
    let config = NavConfig::doom();
    let mut builder = GridBuilder::new(&level, &config);
    builder.seed(&level.spawn_points(&config).unwrap()).unwrap();
    let (mut grid, _) = builder.expand().unwrap();

    let mut compactor = Compactor::new(&mut grid, &config);
    compactor.pack();
    compactor.merge();
    let before: Vec<_> = compactor.areas().map(|a| a.rect).collect();
    assert_eq!(compactor.merge(), 0);
    let after: Vec<_> = compactor.areas().map(|a| a.rect).collect();
    assert_eq!(before, after);
}

#[test]
fn connections_join_distinct_neighbors() {
    for level in [doorway_rooms(0), doorway_rooms(5), teleport_rooms()] {
        let mesh = build(&level).mesh;
        for connection in mesh.connections() {
            assert_ne!(connection.area_a, connection.area_b);
            let a = &mesh.area(connection.area_a).world;
            let b = &mesh.area(connection.area_b).world;
            if connection.is_teleport() {
                assert!(a.intersects(&connection.rect));
                continue;
            }
            for (x, y) in connection.rect.corners() {
                assert!(a.contains_point(x, y));
                assert!(b.contains_point(x, y));
            }
        }
    }
}

#[test]
fn path_cost_never_decreases() {
    let level = doorway_rooms(5);
    let build = build(&level);
    let config = NavConfig::doom();
    let start = WorldPos::new(128.0, 128.0, 0.0);
    let path = Pathfinder::new(&build.mesh, &config)
        .find(start, WorldPos::new(384.0, 128.0, 0.0))
        .unwrap();

    let mut entry = (start.x, start.y);
    let mut total = 0.0;
    for (i, &id) in path.connections.iter().enumerate() {
        let connection = build.mesh.connection(id);
        let center = connection.center();
        let hop = if connection.is_teleport() {
            0.0
        } else {
            let next = build.mesh.area(path.areas[i + 1]);
            (center.0 - entry.0).hypot(center.1 - entry.1) * config.hazard_multiplier(next.flags)
        };
        assert!(hop >= 0.0);
        let running = total + hop;
        assert!(running >= total);
        total = running;
        entry = center;
    }
    assert_eq!(total, path.cost);
    assert!(path.expanded <= build.mesh.areas().len());
}
