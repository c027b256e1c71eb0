use crate::image::Image;

/// Trilinear interpolation of `image` at continuous voxel coordinates `c`
/// (voxel centres at integer coordinates). Neighbours outside the grid
/// contribute zero.
pub fn trilinear(image: &Image, c: [f32; 3]) -> f32 {
    let n = image.fov.n;
    let base = c.map(f32::floor);
    let frac = [c[0] - base[0], c[1] - base[1], c[2] - base[2]];
    if (0..3).any(|d| base[d] < -1.0 || base[d] >= n[d] as f32) { return 0.0 }
    let base = base.map(|b| b as i64);

    let mut value = 0.0;
    for corner in 0..8_u8 {
        let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1].map(i64::from);
        let mut weight = 1.0;
        let mut index = [0_usize; 3];
        let mut inside = true;
        for d in 0..3 {
            let i = base[d] + offset[d];
            weight *= if offset[d] == 1 { frac[d] } else { 1.0 - frac[d] };
            if i < 0 || i >= n[d] as i64 { inside = false; break }
            index[d] = i as usize;
        }
        if inside && weight != 0.0 { value += weight * image[index] }
    }
    value
}
