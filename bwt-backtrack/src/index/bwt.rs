/// 根据后缀数组构建 BWT（排序轮转矩阵的最后一列）。
/// text 为数值化字母表（0..SIGMA），以唯一的 0 ($) 结尾。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut bwt = Vec::with_capacity(n);
    for &p in sa {
        let i = p as usize;
        let prev = if i == 0 { text[n - 1] } else { text[i - 1] };
        bwt.push(prev);
    }
    bwt
}
